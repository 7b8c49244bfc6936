use chrono::NaiveDateTime;
use ndarray::{s, Array1, Array2, Dimension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::config::{DataConfig, ForecastConfig};
use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::layers::linear::LinearLayer;
use crate::layers::lstm_cell::LSTMCell;
use crate::models::forecaster::LSTMForecaster;
use crate::models::lstm_network::LSTMNetwork;
use crate::scaler::MinMaxScaler;
use crate::training::EpochMetrics;
use crate::windowing::create_sequences;

/// Serializable version of Array2<f64> for persistence
#[derive(Serialize, Deserialize)]
pub struct SerializableArray2 {
    data: Vec<f64>,
    shape: (usize, usize),
}

impl From<&Array2<f64>> for SerializableArray2 {
    fn from(array: &Array2<f64>) -> Self {
        Self {
            data: array.iter().cloned().collect(),
            shape: array.raw_dim().into_pattern(),
        }
    }
}

impl TryFrom<SerializableArray2> for Array2<f64> {
    type Error = ForecastError;

    fn try_from(array: SerializableArray2) -> Result<Self> {
        let shape = array.shape;
        Array2::from_shape_vec(shape, array.data).map_err(|e| {
            ForecastError::Serialization(format!("cannot rebuild {:?} matrix: {}", shape, e))
        })
    }
}

/// Serializable LSTM cell parameters
#[derive(Serialize, Deserialize)]
pub struct SerializableLSTMCell {
    w_ih: SerializableArray2,
    w_hh: SerializableArray2,
    b_ih: SerializableArray2,
    b_hh: SerializableArray2,
}

impl From<&LSTMCell> for SerializableLSTMCell {
    fn from(cell: &LSTMCell) -> Self {
        Self {
            w_ih: (&cell.w_ih).into(),
            w_hh: (&cell.w_hh).into(),
            b_ih: (&cell.b_ih).into(),
            b_hh: (&cell.b_hh).into(),
        }
    }
}

impl TryFrom<SerializableLSTMCell> for LSTMCell {
    type Error = ForecastError;

    fn try_from(cell: SerializableLSTMCell) -> Result<Self> {
        let w_ih = Array2::<f64>::try_from(cell.w_ih)?;
        let w_hh = Array2::<f64>::try_from(cell.w_hh)?;
        let b_ih = Array2::<f64>::try_from(cell.b_ih)?;
        let b_hh = Array2::<f64>::try_from(cell.b_hh)?;

        let hidden = w_hh.ncols();
        let gates = (4 * hidden, 1);
        if w_hh.nrows() != 4 * hidden || w_ih.nrows() != 4 * hidden || b_ih.dim() != gates || b_hh.dim() != gates {
            return Err(ForecastError::ShapeMismatch {
                expected: format!("LSTM parameters for {} hidden units", hidden),
                actual: format!(
                    "w_ih {:?}, w_hh {:?}, b_ih {:?}, b_hh {:?}",
                    w_ih.shape(),
                    w_hh.shape(),
                    b_ih.shape(),
                    b_hh.shape()
                ),
            });
        }
        Ok(LSTMCell::from_parameters(w_ih, w_hh, b_ih, b_hh))
    }
}

/// Serializable forecaster: recurrent layers and dense head
#[derive(Serialize, Deserialize)]
pub struct SerializableForecaster {
    cells: Vec<SerializableLSTMCell>,
    head_weight: SerializableArray2,
    head_bias: SerializableArray2,
}

impl From<&LSTMForecaster> for SerializableForecaster {
    fn from(model: &LSTMForecaster) -> Self {
        Self {
            cells: model.network.cells().iter().map(|cell| cell.into()).collect(),
            head_weight: (&model.head.weight).into(),
            head_bias: (&model.head.bias).into(),
        }
    }
}

impl TryFrom<SerializableForecaster> for LSTMForecaster {
    type Error = ForecastError;

    fn try_from(model: SerializableForecaster) -> Result<Self> {
        let cells = model
            .cells
            .into_iter()
            .map(LSTMCell::try_from)
            .collect::<Result<Vec<_>>>()?;
        let network = LSTMNetwork::from_cells(cells)?;
        let head = LinearLayer::from_weights(
            Array2::<f64>::try_from(model.head_weight)?,
            Array2::<f64>::try_from(model.head_bias)?,
        );
        LSTMForecaster::from_parts(network, head)
    }
}

/// Model metadata for tracking training information
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModelMetadata {
    pub model_name: String,
    pub version: String,
    pub created_at: String,
    pub input_size: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub window_length: usize,
    /// Column the single output predicts
    pub target: String,
    /// Input columns, in the order the model reads them
    pub feature_columns: Vec<String>,
    pub total_epochs: usize,
    pub final_loss: Option<f64>,
    pub description: Option<String>,
}

impl ModelMetadata {
    /// Describes a freshly trained model
    pub fn describe(
        model_name: &str,
        model: &LSTMForecaster,
        window_length: usize,
        target: &str,
        feature_columns: &[String],
        history: &[EpochMetrics],
    ) -> Self {
        ModelMetadata {
            model_name: model_name.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            input_size: model.input_size(),
            hidden_size: model.network.hidden_size,
            num_layers: model.network.num_layers,
            window_length,
            target: target.to_string(),
            feature_columns: feature_columns.to_vec(),
            total_epochs: history.len(),
            final_loss: history.last().map(|m| m.train_loss),
            description: None,
        }
    }

    pub fn target_index(&self) -> Result<usize> {
        self.feature_columns
            .iter()
            .position(|c| c == &self.target)
            .ok_or_else(|| ForecastError::MissingColumn(self.target.clone()))
    }
}

/// On-disk layout of a saved forecaster
#[derive(Serialize, Deserialize)]
struct SavedForecasterFile {
    model: SerializableForecaster,
    scaler: MinMaxScaler,
    config: ForecastConfig,
    metadata: ModelMetadata,
}

/// Predictions of a saved model over a whole series, in original units
#[derive(Clone, Debug)]
pub struct SeriesPrediction {
    /// Timestamps of the predicted rows
    pub timestamps: Vec<NaiveDateTime>,
    pub actual: Array1<f64>,
    pub predicted: Array1<f64>,
    /// Forecast for the step after the last row
    pub next: f64,
}

/// A trained model together with everything needed to use it on new data
#[derive(Clone, Debug)]
pub struct SavedForecaster {
    pub model: LSTMForecaster,
    pub scaler: MinMaxScaler,
    pub config: ForecastConfig,
    pub metadata: ModelMetadata,
}

impl SavedForecaster {
    /// Saves as pretty JSON for a `.json` path, bincode otherwise
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = SavedForecasterFile {
            model: (&self.model).into(),
            scaler: self.scaler.clone(),
            config: self.config.clone(),
            metadata: self.metadata.clone(),
        };

        if is_json(path.as_ref()) {
            ModelPersistence::save_to_json(&file, path)
        } else {
            ModelPersistence::save_to_binary(&file, path)
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file: SavedForecasterFile = if is_json(path.as_ref()) {
            ModelPersistence::load_from_json(path)?
        } else {
            ModelPersistence::load_from_binary(path)?
        };

        let model = LSTMForecaster::try_from(file.model)?;
        if model.input_size() != file.metadata.feature_columns.len() || file.scaler.num_features() != model.input_size() {
            return Err(ForecastError::ShapeMismatch {
                expected: format!("{} features", file.metadata.feature_columns.len()),
                actual: format!(
                    "model reading {} and scaler fitted on {}",
                    model.input_size(),
                    file.scaler.num_features()
                ),
            });
        }

        Ok(SavedForecaster {
            model,
            scaler: file.scaler,
            config: file.config,
            metadata: file.metadata,
        })
    }

    /// Data settings to read a new file the same way the training file was read
    pub fn data_config(&self) -> DataConfig {
        DataConfig {
            columns: Some(self.metadata.feature_columns.clone()),
            target: Some(self.metadata.target.clone()),
            ..self.config.data.clone()
        }
    }

    /// Predicts every row of `series` that has a full window before it, and
    /// the row after the end of the series.
    pub fn predict_series(&self, series: &TimeSeries) -> Result<SeriesPrediction> {
        let window = self.metadata.window_length;
        let target = self.metadata.target_index()?;

        let mut values = Array2::zeros((series.len(), self.metadata.feature_columns.len()));
        for (i, name) in self.metadata.feature_columns.iter().enumerate() {
            let column = series.column_index(name)?;
            values.column_mut(i).assign(&series.values().column(column));
        }

        let scaled = self.scaler.transform(values.view())?;
        let windows = create_sequences(scaled.view(), window)?;
        let predicted_scaled = self.model.predict(windows.inputs.view())?;
        let predicted = self
            .scaler
            .inverse_transform_column(target, predicted_scaled.column(0))?;

        let rows = windows.target_rows();
        let actual = values.slice(s![rows.clone(), target]).to_owned();
        let timestamps = series.timestamps()[rows].to_vec();

        let last_window = scaled.slice(s![scaled.nrows() - window.., ..]);
        let next_scaled = self.model.forecast_next(last_window)?;
        let next = self
            .scaler
            .inverse_transform_column(target, next_scaled.view())?
            .get(0)
            .copied()
            .ok_or_else(|| ForecastError::ShapeMismatch {
                expected: "one output".to_string(),
                actual: "none".to_string(),
            })?;

        tracing::debug!(windows = windows.len(), next, "predicted series");

        Ok(SeriesPrediction {
            timestamps,
            actual,
            predicted,
            next,
        })
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"))
}

/// Model persistence operations
pub struct ModelPersistence;

impl ModelPersistence {
    /// Save to JSON format (human-readable)
    pub fn save_to_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Load from JSON format
    pub fn load_from_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Save to binary format (compact and fast)
    pub fn save_to_binary<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, value)?;
        writer.flush()?;
        Ok(())
    }

    /// Load from binary format
    pub fn load_from_binary<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
        let reader = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(reader)?)
    }
}
