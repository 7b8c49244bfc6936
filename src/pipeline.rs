//! End-to-end forecasting run: load, scale, split, train, predict, score.

use chrono::NaiveDateTime;
use ndarray::{s, Array1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;

use crate::config::ForecastConfig;
use crate::data::{write_predictions_csv, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::metrics::ForecastMetrics;
use crate::models::forecaster::LSTMForecaster;
use crate::persistence::{ModelMetadata, SavedForecaster};
use crate::plot::{plot_predictions, PlotSpec};
use crate::scaler::MinMaxScaler;
use crate::split::{chronological_split, training_row_end};
use crate::training::{EpochMetrics, ForecastTrainer};

/// Outcome of one run; values are in the units of the target column
#[derive(Clone, Debug)]
pub struct ForecastReport {
    pub target: String,
    pub rows: usize,
    pub train_windows: usize,
    pub test_windows: usize,
    pub timestamps: Vec<NaiveDateTime>,
    pub actual: Array1<f64>,
    pub predicted: Array1<f64>,
    /// Loss on the scaled test windows
    pub test_loss: f64,
    pub metrics: ForecastMetrics,
    pub history: Vec<EpochMetrics>,
    pub model: SavedForecaster,
}

impl ForecastReport {
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_predictions_csv(path, &self.timestamps, self.actual.view(), self.predicted.view())
    }

    pub fn plot<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        plot_predictions(
            path,
            &PlotSpec::for_target(&self.target),
            self.actual.view(),
            self.predicted.view(),
        )
    }
}

pub struct ForecastPipeline {
    config: ForecastConfig,
}

impl ForecastPipeline {
    pub fn new(config: ForecastConfig) -> Result<Self> {
        config.validate()?;
        Ok(ForecastPipeline { config })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Loads `path` with the configured data settings and runs the pipeline on it
    pub fn run<P: AsRef<Path>>(&self, path: P) -> Result<ForecastReport> {
        let series = TimeSeries::from_csv(path, &self.config.data)?;
        self.run_series(&series)
    }

    /// Trains on the leading part of `series` and predicts the rest.
    ///
    /// The scaler only sees rows read by training windows and is reused to
    /// map predictions back to the target's units.
    pub fn run_series(&self, series: &TimeSeries) -> Result<ForecastReport> {
        let config = &self.config;
        let window = config.seq_length;

        let target = match &config.data.target {
            Some(target) => target.clone(),
            None => series
                .columns()
                .first()
                .cloned()
                .ok_or_else(|| ForecastError::InsufficientData("series has no value columns".to_string()))?,
        };
        let target_index = series.column_index(&target)?;

        let train_end = training_row_end(series.len(), config.train_ratio, window, config.split)?;
        let mut scaler = MinMaxScaler::new();
        scaler.fit(series.values().slice(s![..train_end, ..]))?;
        let scaled = scaler.transform(series.values())?;

        let split = chronological_split(scaled.view(), config.train_ratio, window, config.split)?;
        let train = split.train.target_column(target_index)?;
        let test = split.test.target_column(target_index)?;
        tracing::info!(
            rows = series.len(),
            features = series.num_features(),
            target = %target,
            train_windows = train.len(),
            test_windows = test.len(),
            split = %config.split,
            "prepared windows"
        );

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let model = LSTMForecaster::new(
            series.num_features(),
            config.model.hidden_size,
            config.model.num_layers,
            1,
            &mut rng,
        );

        let mut trainer = ForecastTrainer::new(model, config.loss.build(), config.optimizer.build(config.learning_rate))
            .with_config(config.training.clone());
        if let Some(seed) = config.seed {
            trainer = trainer.with_seed(seed);
        }

        let validation = config.validate_on_test.then_some(&test);
        let history = trainer.fit(&train, validation)?.to_vec();

        let test_loss = trainer.evaluate(&test)?;
        let predicted_scaled = trainer.predict(&test)?;
        let predicted = scaler.inverse_transform_column(target_index, predicted_scaled.column(0))?;

        let rows = test.target_rows();
        let actual = series.values().slice(s![rows.clone(), target_index]).to_owned();
        let timestamps = series.timestamps()[rows].to_vec();
        let metrics = ForecastMetrics::compute(actual.view(), predicted.view())?;
        tracing::info!(test_loss, rmse = metrics.rmse, mae = metrics.mae, "evaluated on test windows");

        let model = trainer.into_model();
        let metadata = ModelMetadata::describe("lstm-forecast", &model, window, &target, series.columns(), &history);

        Ok(ForecastReport {
            target,
            rows: series.len(),
            train_windows: train.len(),
            test_windows: test.len(),
            timestamps,
            actual,
            predicted,
            test_loss,
            metrics,
            history,
            model: SavedForecaster {
                model,
                scaler,
                config: config.clone(),
                metadata,
            },
        })
    }
}
