use lstm_forecast::{
    create_sequences, ForecastConfig, ForecastPipeline, ModelConfig, SplitStrategy, TrainingConfig,
};
use ndarray::{s, Array1, Axis};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write_sine_csv(dir: &Path, rows: usize) -> PathBuf {
    let mut contents = String::from("Date,Close,Volume\n");
    let start = chrono::NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
    for i in 0..rows {
        let date = start + chrono::Duration::days(i as i64);
        let close = 50.0 + 10.0 * (i as f64 * 0.2).sin();
        let volume = 1000.0 + 100.0 * (i as f64 * 0.05).cos();
        writeln!(contents, "{},{:.6},{:.2}", date.format("%Y-%m-%d"), close, volume).unwrap();
    }
    let path = dir.join("prices.csv");
    fs::write(&path, contents).unwrap();
    path
}

fn config(epochs: usize) -> ForecastConfig {
    ForecastConfig {
        seq_length: 8,
        model: ModelConfig {
            hidden_size: 12,
            num_layers: 2,
        },
        training: TrainingConfig {
            epochs,
            batch_size: 16,
            log_every: 0,
            ..TrainingConfig::default()
        },
        learning_rate: 0.01,
        seed: Some(3),
        ..ForecastConfig::default()
    }
}

#[test]
fn test_windowing_properties() {
    let series = Array1::range(0.0, 40.0, 1.0).insert_axis(Axis(1));
    for window in [1, 3, 7] {
        let dataset = create_sequences(series.view(), window).unwrap();
        assert_eq!(dataset.len(), 40 - window);
        for i in 0..dataset.len() {
            let mut joined = dataset.inputs.slice(s![i, .., 0]).to_vec();
            joined.push(dataset.targets[[i, 0]]);
            assert_eq!(joined, series.slice(s![i..i + window + 1, 0]).to_vec());
        }
    }
}

#[test]
fn test_pipeline_from_csv() {
    let dir = tempdir().unwrap();
    let path = write_sine_csv(dir.path(), 150);

    let report = ForecastPipeline::new(config(2)).unwrap().run(&path).unwrap();

    assert_eq!(report.rows, 150);
    assert_eq!(report.target, "Close");
    assert_eq!(report.train_windows, 112);
    assert_eq!(report.test_windows, 22);
    assert_eq!(report.actual.len(), report.predicted.len());
    assert!(report.metrics.rmse.is_finite());
    assert!(report.test_loss >= 0.0);

    let csv_path = dir.path().join("predictions.csv");
    report.write_csv(&csv_path).unwrap();
    let written = fs::read_to_string(&csv_path).unwrap();
    let mut lines = written.lines();
    assert_eq!(lines.next(), Some("date,actual,predicted"));
    assert_eq!(lines.count(), 22);
}

#[test]
fn test_training_reduces_loss_on_sine_wave() {
    let dir = tempdir().unwrap();
    let path = write_sine_csv(dir.path(), 150);

    let report = ForecastPipeline::new(config(25)).unwrap().run(&path).unwrap();
    let first = report.history.first().unwrap();
    let last = report.history.last().unwrap();

    assert_eq!(report.history.len(), 25);
    assert!(
        last.train_loss < first.train_loss,
        "loss did not fall: {} -> {}",
        first.train_loss,
        last.train_loss
    );
    assert!(last.validation_loss.unwrap().is_finite());
}

#[test]
fn test_window_then_split_keeps_straddling_windows() {
    let dir = tempdir().unwrap();
    let path = write_sine_csv(dir.path(), 100);

    let mut cfg = config(1);
    cfg.split = SplitStrategy::WindowThenSplit;
    let report = ForecastPipeline::new(cfg).unwrap().run(&path).unwrap();

    // 92 windows cut at floor(92 * 0.8)
    assert_eq!(report.train_windows, 73);
    assert_eq!(report.test_windows, 19);
    assert_eq!(report.timestamps.len(), 19);
}

#[test]
fn test_validate_on_test_records_test_loss() {
    let dir = tempdir().unwrap();
    let path = write_sine_csv(dir.path(), 100);

    let mut cfg = config(2);
    cfg.validate_on_test = true;
    let report = ForecastPipeline::new(cfg).unwrap().run(&path).unwrap();

    let recorded = report.history.last().unwrap().validation_loss.unwrap();
    assert!((recorded - report.test_loss).abs() < 1e-12);
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r#"{ "seq_length": 12, "training": { "epochs": 7 }, "optimizer": "rmsprop", "loss": "mae" }"#,
    )
    .unwrap();

    let cfg = ForecastConfig::from_json_file(&path).unwrap();
    assert_eq!(cfg.seq_length, 12);
    assert_eq!(cfg.training.epochs, 7);
    assert_eq!(cfg.training.batch_size, 32);
    assert_eq!(cfg.optimizer.to_string(), "rmsprop");
    assert_eq!(cfg.loss.to_string(), "mae");

    fs::write(&path, r#"{ "train_ratio": 1.5 }"#).unwrap();
    assert!(ForecastConfig::from_json_file(&path).is_err());
}
