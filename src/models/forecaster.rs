use ndarray::{s, Array1, Array2, ArrayView2, ArrayView3, Axis};
use rand::Rng;

use crate::error::{ForecastError, Result};
use crate::layers::linear::{LinearGradients, LinearLayer};
use crate::layers::lstm_cell::LSTMCellGradients;
use crate::loss::LossFunction;
use crate::models::lstm_network::LSTMNetwork;
use crate::optimizers::Optimizer;

/// Gradients for every trainable parameter of a forecaster
#[derive(Clone, Debug)]
pub struct ForecasterGradients {
    pub layers: Vec<LSTMCellGradients>,
    pub head: LinearGradients,
}

impl ForecasterGradients {
    /// Clip each gradient matrix to `max_norm` (Frobenius norm)
    pub fn clip(&mut self, max_norm: f64) {
        for layer in &mut self.layers {
            for matrix in layer.matrices_mut() {
                clip_matrix(matrix, max_norm);
            }
        }
        clip_matrix(&mut self.head.weight, max_norm);
        clip_matrix(&mut self.head.bias, max_norm);
    }
}

fn clip_matrix(matrix: &mut Array2<f64>, max_norm: f64) {
    let norm = matrix.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > max_norm {
        let scale = max_norm / norm;
        matrix.mapv_inplace(|x| x * scale);
    }
}

/// Next-value regressor: stacked LSTM layers read a window, a dense layer
/// maps the top layer's last hidden state to the prediction.
#[derive(Clone, Debug)]
pub struct LSTMForecaster {
    pub network: LSTMNetwork,
    pub head: LinearLayer,
}

impl LSTMForecaster {
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        hidden_size: usize,
        num_layers: usize,
        output_size: usize,
        rng: &mut R,
    ) -> Self {
        let network = LSTMNetwork::new(input_size, hidden_size, num_layers, rng);
        let head = LinearLayer::new(hidden_size, output_size, rng);
        LSTMForecaster { network, head }
    }

    /// Assembles a forecaster from a trained network and head
    pub fn from_parts(network: LSTMNetwork, head: LinearLayer) -> Result<Self> {
        if head.input_size != network.hidden_size || head.bias.dim() != (head.output_size, 1) {
            return Err(ForecastError::ShapeMismatch {
                expected: format!("dense layer reading {} hidden units", network.hidden_size),
                actual: format!("weight {:?}, bias {:?}", head.weight.shape(), head.bias.shape()),
            });
        }
        Ok(LSTMForecaster { network, head })
    }

    pub fn input_size(&self) -> usize {
        self.network.input_size
    }

    pub fn output_size(&self) -> usize {
        self.head.output_size
    }

    pub fn num_parameters(&self) -> usize {
        self.network.num_parameters() + self.head.num_parameters()
    }

    /// Predicts one output row per window; `inputs` is (windows, steps, features)
    pub fn predict(&self, inputs: ArrayView3<f64>) -> Result<Array2<f64>> {
        self.check_features(inputs.len_of(Axis(2)))?;
        check_steps(inputs.len_of(Axis(1)))?;
        if inputs.len_of(Axis(0)) == 0 {
            return Ok(Array2::zeros((0, self.output_size())));
        }

        let steps = to_steps(inputs);
        let hidden = self.network.forward_sequence(&steps);
        Ok(self.head.forward(&hidden).reversed_axes())
    }

    /// Predicts the value following a single (steps, features) window
    pub fn forecast_next(&self, window: ArrayView2<f64>) -> Result<Array1<f64>> {
        let batch = window.insert_axis(Axis(0));
        let prediction = self.predict(batch)?;
        Ok(prediction.row(0).to_owned())
    }

    /// Loss and parameter gradients for one mini-batch
    ///
    /// `inputs` is (batch, steps, features), `targets` is (batch, outputs).
    pub fn compute_gradients<L: LossFunction + ?Sized>(
        &self,
        inputs: ArrayView3<f64>,
        targets: ArrayView2<f64>,
        loss_function: &L,
    ) -> Result<(f64, ForecasterGradients)> {
        self.check_features(inputs.len_of(Axis(2)))?;
        check_steps(inputs.len_of(Axis(1)))?;
        let batch_size = inputs.len_of(Axis(0));
        if targets.dim() != (batch_size, self.output_size()) {
            return Err(ForecastError::ShapeMismatch {
                expected: format!("targets ({}, {})", batch_size, self.output_size()),
                actual: format!("targets {:?}", targets.shape()),
            });
        }

        let steps = to_steps(inputs);
        let (hidden, cache) = self.network.forward_sequence_with_cache(&steps);
        let predictions = self.head.forward(&hidden);
        let targets = targets.t().to_owned();

        let loss = loss_function.compute_loss(&predictions, &targets);
        let d_predictions = loss_function.compute_gradient(&predictions, &targets);

        let (head, d_hidden) = self.head.backward(&hidden, &d_predictions);
        let layers = self.network.backward_sequence(&d_hidden, &cache);

        Ok((loss, ForecasterGradients { layers, head }))
    }

    /// Applies gradients with the given optimizer
    pub fn apply_gradients<O: Optimizer + ?Sized>(&mut self, gradients: &ForecasterGradients, optimizer: &mut O) {
        self.network.update_parameters(&gradients.layers, optimizer);
        self.head.update_parameters(&gradients.head, optimizer, "dense");
    }

    fn check_features(&self, features: usize) -> Result<()> {
        if features != self.input_size() {
            return Err(ForecastError::ShapeMismatch {
                expected: format!("{} input features", self.input_size()),
                actual: format!("{} input features", features),
            });
        }
        Ok(())
    }
}

fn check_steps(steps: usize) -> Result<()> {
    if steps == 0 {
        return Err(ForecastError::InsufficientData("windows must have at least one step".to_string()));
    }
    Ok(())
}

/// Splits (batch, steps, features) into per-step (features, batch) matrices
fn to_steps(inputs: ArrayView3<f64>) -> Vec<Array2<f64>> {
    (0..inputs.len_of(Axis(1)))
        .map(|t| inputs.slice(s![.., t, ..]).t().to_owned())
        .collect()
}
