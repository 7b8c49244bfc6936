//! Chronological train/test split.

use ndarray::{s, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ForecastError, Result};
use crate::windowing::{create_sequences, WindowedDataset};

/// Whether the series is cut before or after windowing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SplitStrategy {
    /// Cut the rows, then window each part: no window spans the cut and
    /// test windows only see test-period rows.
    #[default]
    SplitThenWindow,
    /// Window the whole series, then cut the list of windows: keeps the
    /// windows that straddle the cut.
    WindowThenSplit,
}

impl FromStr for SplitStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "split-then-window" | "split-first" => Ok(SplitStrategy::SplitThenWindow),
            "window-then-split" | "window-first" => Ok(SplitStrategy::WindowThenSplit),
            other => Err(format!(
                "unknown split strategy '{}', expected split-then-window or window-then-split",
                other
            )),
        }
    }
}

impl fmt::Display for SplitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitStrategy::SplitThenWindow => write!(f, "split-then-window"),
            SplitStrategy::WindowThenSplit => write!(f, "window-then-split"),
        }
    }
}

/// Training and test windows of one series
#[derive(Clone, Debug)]
pub struct Split {
    pub train: WindowedDataset,
    pub test: WindowedDataset,
}

fn check_ratio(train_ratio: f64) -> Result<()> {
    if train_ratio > 0.0 && train_ratio < 1.0 {
        Ok(())
    } else {
        Err(ForecastError::Config(format!("train_ratio must lie in (0, 1), got {}", train_ratio)))
    }
}

fn cut(len: usize, train_ratio: f64) -> usize {
    (len as f64 * train_ratio).floor() as usize
}

/// Number of leading rows the training windows read (inputs and targets).
///
/// The scaler is fitted on exactly these rows so no test-period value
/// leaks into the scaling.
pub fn training_row_end(rows: usize, train_ratio: f64, window_len: usize, strategy: SplitStrategy) -> Result<usize> {
    check_ratio(train_ratio)?;
    let end = match strategy {
        SplitStrategy::SplitThenWindow => cut(rows, train_ratio),
        SplitStrategy::WindowThenSplit => cut(rows.saturating_sub(window_len), train_ratio) + window_len,
    };
    if end == 0 || end > rows {
        return Err(ForecastError::InsufficientData(format!(
            "{} rows leave no training data with a window of {}",
            rows, window_len
        )));
    }
    Ok(end)
}

/// Cuts (rows, features) data chronologically into training and test windows
pub fn chronological_split(
    data: ArrayView2<f64>,
    train_ratio: f64,
    window_len: usize,
    strategy: SplitStrategy,
) -> Result<Split> {
    check_ratio(train_ratio)?;
    let split = match strategy {
        SplitStrategy::SplitThenWindow => {
            let boundary = cut(data.nrows(), train_ratio);
            let train = create_sequences(data.slice(s![..boundary, ..]), window_len)?;
            let test = create_sequences(data.slice(s![boundary.., ..]), window_len)?.with_row_offset(boundary);
            Split { train, test }
        }
        SplitStrategy::WindowThenSplit => {
            let windows = create_sequences(data, window_len)?;
            let boundary = cut(windows.len(), train_ratio);
            Split {
                train: windows.slice(0..boundary),
                test: windows.slice(boundary..windows.len()),
            }
        }
    };

    if split.train.is_empty() || split.test.is_empty() {
        return Err(ForecastError::InsufficientData(format!(
            "split produced {} training and {} test windows",
            split.train.len(),
            split.test.len()
        )));
    }
    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2, Axis};

    fn ramp(n: usize) -> Array2<f64> {
        Array1::range(0.0, n as f64, 1.0).insert_axis(Axis(1))
    }

    #[test]
    fn test_split_then_window_sizes() {
        let data = ramp(100);
        let split = chronological_split(data.view(), 0.8, 10, SplitStrategy::SplitThenWindow).unwrap();

        assert_eq!(split.train.len(), 70);
        assert_eq!(split.test.len(), 10);
        assert_eq!(split.test.first_target_row, 90);
        // test windows never reach back into the training rows
        assert_eq!(split.test.inputs[[0, 0, 0]], 80.0);
        assert_eq!(training_row_end(100, 0.8, 10, SplitStrategy::SplitThenWindow).unwrap(), 80);
    }

    #[test]
    fn test_window_then_split_sizes() {
        let data = ramp(100);
        let split = chronological_split(data.view(), 0.8, 10, SplitStrategy::WindowThenSplit).unwrap();

        assert_eq!(split.train.len(), 72);
        assert_eq!(split.test.len(), 18);
        assert_eq!(split.test.first_target_row, 82);
        assert_eq!(split.test.inputs[[0, 0, 0]], 72.0);
        assert_eq!(training_row_end(100, 0.8, 10, SplitStrategy::WindowThenSplit).unwrap(), 82);
    }

    #[test]
    fn test_split_rejects_degenerate_input() {
        let data = ramp(20);
        assert!(chronological_split(data.view(), 0.8, 10, SplitStrategy::SplitThenWindow).is_err());
        assert!(chronological_split(data.view(), 1.0, 2, SplitStrategy::WindowThenSplit).is_err());
        assert!(chronological_split(data.view(), 0.0, 2, SplitStrategy::WindowThenSplit).is_err());
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("split_then_window".parse::<SplitStrategy>().unwrap(), SplitStrategy::SplitThenWindow);
        assert_eq!("window-first".parse::<SplitStrategy>().unwrap(), SplitStrategy::WindowThenSplit);
        assert!("random".parse::<SplitStrategy>().is_err());
    }
}
