use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::{ForecastError, Result};
use crate::loss::{LossFunction, MSELoss};
use crate::models::forecaster::LSTMForecaster;
use crate::optimizers::{Adam, Optimizer};
use crate::windowing::WindowedDataset;

/// Configuration for training hyperparameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    /// Fraction of the training windows held out for validation when no
    /// validation set is passed to `fit`
    pub validation_split: f64,
    pub shuffle: bool,
    /// Per-matrix gradient norm limit
    pub clip_gradient: Option<f64>,
    /// Log every n-th epoch; 0 disables per-epoch logging
    pub log_every: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            epochs: 50,
            batch_size: 32,
            validation_split: 0.1,
            shuffle: true,
            clip_gradient: None,
            log_every: 1,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(ForecastError::Config("epochs must be positive".to_string()));
        }
        if self.batch_size == 0 {
            return Err(ForecastError::Config("batch_size must be positive".to_string()));
        }
        if !(0.0..1.0).contains(&self.validation_split) {
            return Err(ForecastError::Config(format!(
                "validation_split must lie in [0, 1), got {}",
                self.validation_split
            )));
        }
        if let Some(max_norm) = self.clip_gradient {
            if !(max_norm > 0.0) {
                return Err(ForecastError::Config(format!("clip_gradient must be positive, got {}", max_norm)));
            }
        }
        Ok(())
    }
}

/// Training metrics tracked during training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 1-based epoch number
    pub epoch: usize,
    pub train_loss: f64,
    pub validation_loss: Option<f64>,
    pub time_elapsed: f64,
}

/// Mini-batch trainer for a forecaster with configurable loss and optimizer
pub struct ForecastTrainer<L: LossFunction, O: Optimizer> {
    pub model: LSTMForecaster,
    pub loss_function: L,
    pub optimizer: O,
    pub config: TrainingConfig,
    pub metrics_history: Vec<EpochMetrics>,
    rng: StdRng,
}

impl<L: LossFunction, O: Optimizer> ForecastTrainer<L, O> {
    pub fn new(model: LSTMForecaster, loss_function: L, optimizer: O) -> Self {
        ForecastTrainer {
            model,
            loss_function,
            optimizer,
            config: TrainingConfig::default(),
            metrics_history: Vec::new(),
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_config(mut self, config: TrainingConfig) -> Self {
        self.config = config;
        self
    }

    /// Fixes the shuffling order
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// One gradient step on a mini-batch; returns the batch loss before the update
    pub fn train_batch(&mut self, inputs: ndarray::ArrayView3<f64>, targets: ndarray::ArrayView2<f64>) -> Result<f64> {
        let (loss, mut gradients) = self
            .model
            .compute_gradients(inputs, targets, &self.loss_function)?;

        if let Some(max_norm) = self.config.clip_gradient {
            gradients.clip(max_norm);
        }

        self.model.apply_gradients(&gradients, &mut self.optimizer);
        Ok(loss)
    }

    /// Trains for `config.epochs` epochs.
    ///
    /// Without an explicit `validation` set the last `validation_split`
    /// fraction of `train` is held out: it is neither shuffled nor trained on.
    pub fn fit(&mut self, train: &WindowedDataset, validation: Option<&WindowedDataset>) -> Result<&[EpochMetrics]> {
        self.config.validate()?;
        if train.is_empty() {
            return Err(ForecastError::InsufficientData("no training windows".to_string()));
        }

        let (fit_set, holdout) = match validation {
            Some(validation) => (train.clone(), Some(validation.clone())),
            None if self.config.validation_split > 0.0 => {
                let split_at = (train.len() as f64 * (1.0 - self.config.validation_split)).floor() as usize;
                if split_at == 0 {
                    return Err(ForecastError::InsufficientData(format!(
                        "validation_split {} leaves none of {} windows for training",
                        self.config.validation_split,
                        train.len()
                    )));
                }
                let holdout = (split_at < train.len()).then(|| train.slice(split_at..train.len()));
                (train.slice(0..split_at), holdout)
            }
            None => (train.clone(), None),
        };

        tracing::info!(
            epochs = self.config.epochs,
            train_windows = fit_set.len(),
            validation_windows = holdout.as_ref().map_or(0, |h| h.len()),
            parameters = self.model.num_parameters(),
            "starting training"
        );

        let mut order: Vec<usize> = (0..fit_set.len()).collect();
        for epoch in 1..=self.config.epochs {
            let start_time = Instant::now();
            if self.config.shuffle {
                order.shuffle(&mut self.rng);
            }

            let mut epoch_loss = 0.0;
            for batch in order.chunks(self.config.batch_size) {
                let (inputs, targets) = fit_set.select(batch);
                let loss = self.train_batch(inputs.view(), targets.view())?;
                epoch_loss += loss * batch.len() as f64;
            }
            epoch_loss /= fit_set.len() as f64;

            if !epoch_loss.is_finite() {
                return Err(ForecastError::Diverged {
                    epoch,
                    loss: epoch_loss,
                });
            }

            let validation_loss = match &holdout {
                Some(dataset) => Some(self.evaluate(dataset)?),
                None => None,
            };

            let metrics = EpochMetrics {
                epoch,
                train_loss: epoch_loss,
                validation_loss,
                time_elapsed: start_time.elapsed().as_secs_f64(),
            };

            let log_now = self.config.log_every > 0 && (epoch % self.config.log_every == 0 || epoch == self.config.epochs);
            if log_now {
                tracing::info!(
                    epoch,
                    train_loss = metrics.train_loss,
                    validation_loss = ?metrics.validation_loss,
                    secs = metrics.time_elapsed,
                    "epoch finished"
                );
            }
            self.metrics_history.push(metrics);
        }

        Ok(&self.metrics_history)
    }

    /// Loss over a dataset, averaged per window
    pub fn evaluate(&self, dataset: &WindowedDataset) -> Result<f64> {
        if dataset.is_empty() {
            return Err(ForecastError::InsufficientData("cannot evaluate on zero windows".to_string()));
        }
        let predictions = self.model.predict(dataset.inputs.view())?;
        Ok(self.loss_function.compute_loss(&predictions, &dataset.targets))
    }

    /// Predictions shaped (windows, outputs)
    pub fn predict(&self, dataset: &WindowedDataset) -> Result<Array2<f64>> {
        self.model.predict(dataset.inputs.view())
    }

    pub fn latest_metrics(&self) -> Option<&EpochMetrics> {
        self.metrics_history.last()
    }

    pub fn metrics_history(&self) -> &[EpochMetrics] {
        &self.metrics_history
    }

    pub fn into_model(self) -> LSTMForecaster {
        self.model
    }
}

/// Trainer with the defaults used for next-value regression: MSE and Adam
pub fn create_default_trainer(model: LSTMForecaster, learning_rate: f64) -> ForecastTrainer<MSELoss, Adam> {
    ForecastTrainer::new(model, MSELoss, Adam::new(learning_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizers::SGD;
    use crate::windowing::create_sequences;
    use ndarray::{Array1, Axis};

    fn sine_windows(n: usize, window: usize) -> WindowedDataset {
        let series = Array1::from_shape_fn(n, |i| 0.5 + 0.4 * (i as f64 * 0.3).sin()).insert_axis(Axis(1));
        create_sequences(series.view(), window).unwrap()
    }

    fn small_model(seed: u64) -> LSTMForecaster {
        LSTMForecaster::new(1, 8, 1, 1, &mut StdRng::seed_from_u64(seed))
    }

    #[test]
    fn test_default_config() {
        let config = TrainingConfig::default();
        assert_eq!(config.epochs, 50);
        assert_eq!(config.batch_size, 32);
        assert!((config.validation_split - 0.1).abs() < 1e-12);
        assert!(config.shuffle);
        assert!(config.clip_gradient.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = TrainingConfig::default();
        config.validation_split = 1.0;
        assert!(config.validate().is_err());

        let mut config = TrainingConfig::default();
        config.clip_gradient = Some(0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_holdout_is_taken_from_the_end() {
        let data = sine_windows(45, 5);
        let config = TrainingConfig {
            epochs: 1,
            batch_size: 8,
            validation_split: 0.25,
            ..TrainingConfig::default()
        };
        let mut trainer = create_default_trainer(small_model(1), 0.01).with_config(config).with_seed(3);

        let history = trainer.fit(&data, None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].epoch, 1);

        let holdout = data.slice(30..40);
        let expected = trainer.evaluate(&holdout).unwrap();
        let recorded = trainer.latest_metrics().unwrap().validation_loss.unwrap();
        assert!((recorded - expected).abs() < 1e-12);
    }

    #[test]
    fn test_training_reduces_loss() {
        let data = sine_windows(80, 6);
        let config = TrainingConfig {
            epochs: 40,
            batch_size: 16,
            validation_split: 0.0,
            log_every: 0,
            ..TrainingConfig::default()
        };
        let mut trainer = create_default_trainer(small_model(7), 0.01).with_config(config).with_seed(11);

        let before = trainer.evaluate(&data).unwrap();
        let history = trainer.fit(&data, None).unwrap().to_vec();
        let after = trainer.evaluate(&data).unwrap();

        assert_eq!(history.len(), 40);
        assert!(history.iter().all(|m| m.validation_loss.is_none()));
        assert!(after < before, "loss went from {} to {}", before, after);
        assert!(history[39].train_loss < history[0].train_loss);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let data = sine_windows(40, 4);
        let config = TrainingConfig {
            epochs: 3,
            batch_size: 5,
            ..TrainingConfig::default()
        };

        let run = || {
            let mut trainer = ForecastTrainer::new(small_model(2), MSELoss, SGD::new(0.05))
                .with_config(config.clone())
                .with_seed(9);
            trainer.fit(&data, None).unwrap();
            trainer.predict(&data).unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_explicit_validation_set() {
        let data = sine_windows(30, 4);
        let validation = data.slice(20..26);
        let config = TrainingConfig {
            epochs: 2,
            ..TrainingConfig::default()
        };
        let mut trainer = create_default_trainer(small_model(4), 0.01).with_config(config);

        let history = trainer.fit(&data, Some(&validation)).unwrap();
        assert!(history.iter().all(|m| m.validation_loss.is_some()));
    }

    #[test]
    fn test_empty_training_set_is_rejected() {
        let data = sine_windows(30, 4).slice(0..0);
        let mut trainer = create_default_trainer(small_model(0), 0.01);
        assert!(matches!(trainer.fit(&data, None), Err(ForecastError::InsufficientData(_))));
    }
}
