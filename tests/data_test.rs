use lstm_forecast::{DataConfig, ForecastError, MissingValuePolicy, TimeSeries};
use std::fs;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

fn write_csv(contents: &str) -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("series.csv");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn test_rows_are_sorted_chronologically() {
    let (_dir, path) = write_csv(
        "Date,US_VIX,SPX\n\
         2024-01-03,13.0,4700\n\
         2024-01-01,12.0,4690\n\
         2024-01-02,12.5,4695\n",
    );

    let series = TimeSeries::from_csv(&path, &DataConfig::default()).unwrap();
    assert_eq!(series.len(), 3);
    assert_eq!(series.columns(), &["US_VIX".to_string(), "SPX".to_string()]);
    assert_eq!(series.values().column(0).to_vec(), vec![12.0, 12.5, 13.0]);
    assert!(series.timestamps().windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_selected_columns_and_custom_date_column() {
    let (_dir, path) = write_csv(
        "timestamp,a,b,c\n\
         01/01/2024,1,2,3\n\
         01/02/2024,4,5,6\n",
    );
    let config = DataConfig {
        date_column: "timestamp".to_string(),
        columns: Some(vec!["c".to_string(), "a".to_string()]),
        ..DataConfig::default()
    };

    let series = TimeSeries::from_csv(&path, &config).unwrap();
    assert_eq!(series.num_features(), 2);
    assert_eq!(series.values().row(1).to_vec(), vec![6.0, 4.0]);
}

#[test]
fn test_duplicate_timestamps_are_rejected() {
    let (_dir, path) = write_csv("Date,x\n2024-01-01,1\n2024-01-02,2\n2024-01-01,3\n");
    let result = TimeSeries::from_csv(&path, &DataConfig::default());
    assert!(matches!(result, Err(ForecastError::DuplicateTimestamp(_))));
}

#[test]
fn test_missing_value_policies() {
    let contents = "Date,x\n2024-01-01,1\n2024-01-02,\n2024-01-03,NaN\n2024-01-04,4\n";
    let (_dir, path) = write_csv(contents);

    let rejected = TimeSeries::from_csv(&path, &DataConfig::default());
    assert!(matches!(
        rejected,
        Err(ForecastError::MissingValue { ref column, .. }) if column == "x"
    ));

    let zero = DataConfig {
        missing: MissingValuePolicy::Zero,
        ..DataConfig::default()
    };
    let series = TimeSeries::from_csv(&path, &zero).unwrap();
    assert_eq!(series.values().column(0).to_vec(), vec![1.0, 0.0, 0.0, 4.0]);

    let forward = DataConfig {
        missing: MissingValuePolicy::Forward,
        ..DataConfig::default()
    };
    let series = TimeSeries::from_csv(&path, &forward).unwrap();
    assert_eq!(series.values().column(0).to_vec(), vec![1.0, 1.0, 1.0, 4.0]);
}

#[test]
fn test_parse_errors_name_row_and_column() {
    let (_dir, path) = write_csv("Date,x\n2024-01-01,1\n2024-01-02,abc\n");
    match TimeSeries::from_csv(&path, &DataConfig::default()) {
        Err(ForecastError::Parse { row, column, value }) => {
            assert_eq!(row, 3);
            assert_eq!(column, "x");
            assert_eq!(value, "abc");
        }
        other => panic!("expected a parse error, got {:?}", other),
    }

    let (_dir, path) = write_csv("Date,x\nyesterday,1\n");
    assert!(matches!(
        TimeSeries::from_csv(&path, &DataConfig::default()),
        Err(ForecastError::Parse { .. })
    ));
}

#[test]
fn test_missing_columns() {
    let (_dir, path) = write_csv("Day,x\n2024-01-01,1\n");
    assert!(matches!(
        TimeSeries::from_csv(&path, &DataConfig::default()),
        Err(ForecastError::MissingColumn(name)) if name == "Date"
    ));

    let (_dir, path) = write_csv("Date,x\n2024-01-01,1\n");
    let config = DataConfig {
        columns: Some(vec!["y".to_string()]),
        ..DataConfig::default()
    };
    assert!(matches!(
        TimeSeries::from_csv(&path, &config),
        Err(ForecastError::MissingColumn(name)) if name == "y"
    ));
}

#[test]
fn test_empty_file_is_insufficient() {
    let (_dir, path) = write_csv("Date,x\n");
    assert!(matches!(
        TimeSeries::from_csv(&path, &DataConfig::default()),
        Err(ForecastError::InsufficientData(_))
    ));
}
