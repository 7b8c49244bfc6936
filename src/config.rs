//! Run configuration.
//!
//! Defaults describe a two-layer stacked LSTM with 50 hidden units fed
//! windows of 10, trained for 50 epochs in batches of 32 with Adam at 0.001
//! on mean squared error, over an 80/20 chronological split. A JSON file may set any
//! subset of the fields; the command line overrides the file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{ForecastError, Result};
use crate::loss::LossKind;
use crate::optimizers::OptimizerKind;
use crate::split::SplitStrategy;
use crate::training::TrainingConfig;

/// What to do with empty or NaN cells
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingValuePolicy {
    /// Fail, naming the row and column
    #[default]
    Reject,
    /// Replace with 0.0
    Zero,
    /// Carry the previous observation of the same column forward
    Forward,
}

impl FromStr for MissingValuePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reject" => Ok(MissingValuePolicy::Reject),
            "zero" => Ok(MissingValuePolicy::Zero),
            "forward" | "ffill" => Ok(MissingValuePolicy::Forward),
            other => Err(format!("unknown missing-value policy '{}', expected reject, zero or forward", other)),
        }
    }
}

impl fmt::Display for MissingValuePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MissingValuePolicy::Reject => "reject",
            MissingValuePolicy::Zero => "zero",
            MissingValuePolicy::Forward => "forward",
        };
        write!(f, "{}", name)
    }
}

/// Which columns of the CSV file to read
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub date_column: String,
    /// Feature columns; `None` selects every column except the date
    pub columns: Option<Vec<String>>,
    /// Column to predict; `None` selects the first feature column
    pub target: Option<String>,
    pub missing: MissingValuePolicy,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            date_column: "Date".to_string(),
            columns: None,
            target: None,
            missing: MissingValuePolicy::Reject,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub hidden_size: usize,
    pub num_layers: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            hidden_size: 50,
            num_layers: 2,
        }
    }
}

/// Complete configuration of one forecasting run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub data: DataConfig,
    /// Number of consecutive observations in each input window
    pub seq_length: usize,
    pub train_ratio: f64,
    pub split: SplitStrategy,
    pub model: ModelConfig,
    pub training: TrainingConfig,
    pub optimizer: OptimizerKind,
    pub learning_rate: f64,
    pub loss: LossKind,
    /// Validate on the test windows instead of a hold-out from the training windows
    pub validate_on_test: bool,
    pub seed: Option<u64>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        ForecastConfig {
            data: DataConfig::default(),
            seq_length: 10,
            train_ratio: 0.8,
            split: SplitStrategy::SplitThenWindow,
            model: ModelConfig::default(),
            training: TrainingConfig::default(),
            optimizer: OptimizerKind::Adam,
            learning_rate: 0.001,
            loss: LossKind::Mse,
            validate_on_test: false,
            seed: None,
        }
    }
}

impl ForecastConfig {
    /// Reads a JSON configuration file; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: ForecastConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.seq_length == 0 {
            return Err(ForecastError::Config("seq_length must be positive".to_string()));
        }
        if !(self.train_ratio > 0.0 && self.train_ratio < 1.0) {
            return Err(ForecastError::Config(format!(
                "train_ratio must lie in (0, 1), got {}",
                self.train_ratio
            )));
        }
        if self.model.hidden_size == 0 || self.model.num_layers == 0 {
            return Err(ForecastError::Config(
                "model needs at least one layer with at least one hidden unit".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ForecastError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if matches!(&self.data.columns, Some(columns) if columns.is_empty()) {
            return Err(ForecastError::Config("column list is empty".to_string()));
        }
        self.training.validate()
    }
}
