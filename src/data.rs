//! CSV ingestion of date-indexed series.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, Trim, Writer};
use ndarray::{s, Array2, ArrayView1, ArrayView2};
use serde::Serialize;
use std::ops::Range;
use std::path::Path;

use crate::config::{DataConfig, MissingValuePolicy};
use crate::error::{ForecastError, Result};

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];
const MISSING_MARKERS: &[&str] = &["", "nan", "na", "n/a", "null", "none"];

/// Ordered observations indexed by timestamp
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeries {
    timestamps: Vec<NaiveDateTime>,
    values: Array2<f64>,
    columns: Vec<String>,
}

impl TimeSeries {
    /// Builds a series from already-parsed parts.
    ///
    /// Rows must be strictly increasing in time and every value finite.
    pub fn from_parts(timestamps: Vec<NaiveDateTime>, values: Array2<f64>, columns: Vec<String>) -> Result<Self> {
        if values.nrows() != timestamps.len() || values.ncols() != columns.len() {
            return Err(ForecastError::ShapeMismatch {
                expected: format!("({}, {})", timestamps.len(), columns.len()),
                actual: format!("{:?}", values.shape()),
            });
        }
        if let Some(pair) = timestamps.windows(2).find(|pair| pair[0] >= pair[1]) {
            if pair[0] == pair[1] {
                return Err(ForecastError::DuplicateTimestamp(pair[1].to_string()));
            }
            return Err(ForecastError::UnorderedTimestamps {
                earlier: pair[1].to_string(),
                later: pair[0].to_string(),
            });
        }
        if let Some(((row, col), _)) = values.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(ForecastError::MissingValue {
                row,
                column: columns[col].clone(),
            });
        }

        Ok(TimeSeries {
            timestamps,
            values,
            columns,
        })
    }

    /// Loads the configured columns of a CSV file.
    ///
    /// Rows are sorted chronologically, duplicate timestamps rejected and
    /// missing cells handled according to `config.missing`.
    pub fn from_csv<P: AsRef<Path>>(path: P, config: &DataConfig) -> Result<Self> {
        let mut reader = ReaderBuilder::new().trim(Trim::All).from_path(path.as_ref())?;
        let headers = reader.headers()?.clone();

        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| ForecastError::MissingColumn(name.to_string()))
        };
        let date_index = find(&config.date_column)?;
        let columns: Vec<String> = match &config.columns {
            Some(columns) => columns.clone(),
            None => headers
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != date_index)
                .map(|(_, h)| h.to_string())
                .collect(),
        };
        if columns.is_empty() {
            return Err(ForecastError::InsufficientData("no value columns besides the date".to_string()));
        }
        let indices = columns.iter().map(|c| find(c)).collect::<Result<Vec<_>>>()?;

        let mut rows: Vec<(NaiveDateTime, u64, Vec<f64>)> = Vec::new();
        for record in reader.records() {
            let record = record?;
            let line = record.position().map_or(0, |p| p.line());
            let cell = |index: usize| record.get(index).unwrap_or("");

            let raw_date = cell(date_index);
            let timestamp = parse_timestamp(raw_date).ok_or_else(|| ForecastError::Parse {
                row: line as usize,
                column: config.date_column.clone(),
                value: raw_date.to_string(),
            })?;

            let values = indices
                .iter()
                .zip(&columns)
                .map(|(&index, name)| {
                    parse_value(cell(index)).ok_or_else(|| ForecastError::Parse {
                        row: line as usize,
                        column: name.clone(),
                        value: cell(index).to_string(),
                    })
                })
                .collect::<Result<Vec<f64>>>()?;

            rows.push((timestamp, line, values));
        }

        if rows.is_empty() {
            return Err(ForecastError::InsufficientData("CSV file has no data rows".to_string()));
        }

        rows.sort_by_key(|(timestamp, _, _)| *timestamp);
        if let Some(pair) = rows.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(ForecastError::DuplicateTimestamp(pair[1].0.to_string()));
        }

        let mut values = Array2::zeros((rows.len(), columns.len()));
        for (i, (_, _, row)) in rows.iter().enumerate() {
            values.row_mut(i).assign(&ArrayView1::from(row.as_slice()));
        }
        let lines: Vec<u64> = rows.iter().map(|(_, line, _)| *line).collect();
        fill_missing(&mut values, &columns, &lines, config.missing)?;

        let timestamps = rows.into_iter().map(|(timestamp, _, _)| timestamp).collect();
        tracing::debug!(rows = values.nrows(), columns = ?columns, "loaded series");

        Ok(TimeSeries {
            timestamps,
            values,
            columns,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    /// Observations shaped (rows, features)
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| ForecastError::MissingColumn(name.to_string()))
    }

    /// A contiguous run of rows as a new series
    pub fn slice_rows(&self, range: Range<usize>) -> Result<TimeSeries> {
        if range.start > range.end || range.end > self.len() {
            return Err(ForecastError::InsufficientData(format!(
                "rows {}..{} are outside a series of {} rows",
                range.start,
                range.end,
                self.len()
            )));
        }
        Ok(TimeSeries {
            timestamps: self.timestamps[range.clone()].to_vec(),
            values: self.values.slice(s![range, ..]).to_owned(),
            columns: self.columns.clone(),
        })
    }
}

/// Parses the date formats commonly found in exported price and index data
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Some(datetime.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// `Some(NaN)` for a missing marker, `Some(v)` for a finite number, `None` otherwise
fn parse_value(raw: &str) -> Option<f64> {
    if MISSING_MARKERS.iter().any(|marker| raw.eq_ignore_ascii_case(marker)) {
        return Some(f64::NAN);
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() || value.is_nan() => Some(value),
        _ => None,
    }
}

fn fill_missing(values: &mut Array2<f64>, columns: &[String], lines: &[u64], policy: MissingValuePolicy) -> Result<()> {
    for (col, name) in columns.iter().enumerate() {
        let mut previous: Option<f64> = None;
        for row in 0..values.nrows() {
            let value = values[[row, col]];
            if !value.is_nan() {
                previous = Some(value);
                continue;
            }
            values[[row, col]] = match (policy, previous) {
                (MissingValuePolicy::Zero, _) => 0.0,
                (MissingValuePolicy::Forward, Some(last)) => last,
                _ => {
                    return Err(ForecastError::MissingValue {
                        row: lines[row] as usize,
                        column: name.clone(),
                    })
                }
            };
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct PredictionRecord {
    date: String,
    actual: f64,
    predicted: f64,
}

/// Writes `date,actual,predicted` rows
pub fn write_predictions_csv<P: AsRef<Path>>(
    path: P,
    timestamps: &[NaiveDateTime],
    actual: ArrayView1<f64>,
    predicted: ArrayView1<f64>,
) -> Result<()> {
    if timestamps.len() != actual.len() || actual.len() != predicted.len() {
        return Err(ForecastError::ShapeMismatch {
            expected: format!("{} rows", timestamps.len()),
            actual: format!("{} actual and {} predicted values", actual.len(), predicted.len()),
        });
    }

    let mut writer = Writer::from_path(path)?;
    for ((timestamp, &actual), &predicted) in timestamps.iter().zip(actual).zip(predicted) {
        writer.serialize(PredictionRecord {
            date: timestamp.to_string(),
            actual,
            predicted,
        })?;
    }
    writer.flush()?;
    Ok(())
}
