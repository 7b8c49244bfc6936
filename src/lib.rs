//! # lstm-forecast
//!
//! Next-value forecasting of date-indexed series with stacked LSTM networks.
//!
//! ## Pipeline
//!
//! - **Data**: CSV ingestion with date parsing, chronological ordering and
//!   missing-value policies
//! - **Scaling**: per-feature min-max scaling fitted on the training period
//! - **Windowing**: fixed-length sliding windows, each paired with the next row
//! - **Split**: chronological train/test split, before or after windowing
//! - **Model**: stacked LSTM layers with full backpropagation through time and
//!   a dense output layer
//! - **Training**: mini-batch training with Adam, SGD or RMSprop and a
//!   validation hold-out
//! - **Output**: error metrics, actual vs. predicted charts, prediction CSVs and
//!   saved models
//!
//! ## Quick Start
//!
//! ```no_run
//! use lstm_forecast::{ForecastConfig, ForecastPipeline};
//!
//! let mut config = ForecastConfig::default();
//! config.data.target = Some("Close".to_string());
//!
//! let report = ForecastPipeline::new(config)?.run("prices.csv")?;
//! println!("{}", report.metrics);
//! report.plot("prices.png")?;
//! # Ok::<(), lstm_forecast::ForecastError>(())
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod layers;
pub mod loss;
pub mod metrics;
pub mod models;
pub mod optimizers;
pub mod persistence;
pub mod pipeline;
pub mod plot;
pub mod scaler;
pub mod split;
pub mod training;
pub mod utils;
pub mod windowing;

// Re-export commonly used items
pub use config::{DataConfig, ForecastConfig, MissingValuePolicy, ModelConfig};
pub use data::TimeSeries;
pub use error::{ForecastError, Result};
pub use layers::linear::LinearLayer;
pub use layers::lstm_cell::LSTMCell;
pub use loss::{LossFunction, LossKind, MAELoss, MSELoss};
pub use metrics::ForecastMetrics;
pub use models::forecaster::LSTMForecaster;
pub use models::lstm_network::LSTMNetwork;
pub use optimizers::{Adam, Optimizer, OptimizerKind, RMSprop, SGD};
pub use persistence::{ModelMetadata, ModelPersistence, SavedForecaster, SeriesPrediction};
pub use pipeline::{ForecastPipeline, ForecastReport};
pub use plot::{plot_predictions, PlotSpec};
pub use scaler::MinMaxScaler;
pub use split::{chronological_split, Split, SplitStrategy};
pub use training::{EpochMetrics, ForecastTrainer, TrainingConfig};
pub use windowing::{create_sequences, WindowedDataset};

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_library_integration() {
        let series = Array2::from_shape_fn((30, 1), |(r, _)| (r as f64 * 0.5).sin());
        let mut scaler = MinMaxScaler::new();
        let scaled = scaler.fit_transform(series.view()).unwrap();
        let dataset = create_sequences(scaled.view(), 5).unwrap();

        let model = LSTMForecaster::new(1, 3, 2, 1, &mut StdRng::seed_from_u64(1));
        let predictions = model.predict(dataset.inputs.view()).unwrap();

        assert_eq!(predictions.shape(), &[25, 1]);
        let restored = scaler.inverse_transform(predictions.view()).unwrap();
        assert_eq!(restored.shape(), &[25, 1]);
    }
}
