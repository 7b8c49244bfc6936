use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Errors produced while loading, preparing, training or persisting a forecaster
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A cell that could not be parsed as a number or a date
    #[error("row {row}, column '{column}': cannot parse '{value}'")]
    Parse {
        row: usize,
        column: String,
        value: String,
    },

    #[error("column '{0}' not found")]
    MissingColumn(String),

    #[error("row {row}, column '{column}': missing value")]
    MissingValue { row: usize, column: String },

    #[error("duplicate timestamp {0}")]
    DuplicateTimestamp(String),

    #[error("timestamp {later} comes after {earlier} but is listed before it")]
    UnorderedTimestamps { earlier: String, later: String },

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("scaler has not been fitted")]
    ScalerNotFitted,

    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("training diverged at epoch {epoch} (loss {loss})")]
    Diverged { epoch: usize, loss: f64 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("plotting error: {0}")]
    Plot(String),
}

impl From<serde_json::Error> for ForecastError {
    fn from(error: serde_json::Error) -> Self {
        ForecastError::Serialization(error.to_string())
    }
}

impl From<bincode::Error> for ForecastError {
    fn from(error: bincode::Error) -> Self {
        ForecastError::Serialization(error.to_string())
    }
}
