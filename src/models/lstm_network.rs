use ndarray::Array2;
use rand::Rng;

use crate::error::{ForecastError, Result};
use crate::layers::lstm_cell::{LSTMCell, LSTMCellCache, LSTMCellGradients};
use crate::optimizers::Optimizer;

/// Hidden and cell state of one layer, shaped (hidden_size, batch)
#[derive(Clone, Debug)]
pub struct LayerState {
    pub h: Array2<f64>,
    pub c: Array2<f64>,
}

/// Per-step, per-layer caches collected while running a window forward
#[derive(Clone, Debug, Default)]
pub struct SequenceCache {
    pub steps: Vec<Vec<LSTMCellCache>>,
}

/// Multi-layer LSTM network for sequence modeling
///
/// Stacks LSTM cells where the hidden output of layer i at step t becomes
/// the input of layer i+1 at step t. Every layer carries its own hidden and
/// cell state across the steps of a window.
#[derive(Clone, Debug)]
pub struct LSTMNetwork {
    cells: Vec<LSTMCell>,
    pub input_size: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
}

impl LSTMNetwork {
    /// Creates a new multi-layer LSTM network
    ///
    /// First layer accepts `input_size` dimensions, subsequent layers
    /// accept `hidden_size` dimensions from the previous layer.
    pub fn new<R: Rng + ?Sized>(input_size: usize, hidden_size: usize, num_layers: usize, rng: &mut R) -> Self {
        let cells = (0..num_layers)
            .map(|i| {
                let layer_input_size = if i == 0 { input_size } else { hidden_size };
                LSTMCell::new(layer_input_size, hidden_size, rng)
            })
            .collect();

        LSTMNetwork {
            cells,
            input_size,
            hidden_size,
            num_layers,
        }
    }

    /// Creates a network from existing cells (used for deserialization)
    pub fn from_cells(cells: Vec<LSTMCell>) -> Result<Self> {
        let first = cells
            .first()
            .ok_or_else(|| ForecastError::Config("network needs at least one layer".to_string()))?;
        let input_size = first.input_size;
        let hidden_size = first.hidden_size;

        for (i, cell) in cells.iter().enumerate() {
            let expected_input = if i == 0 { input_size } else { hidden_size };
            if cell.hidden_size != hidden_size || cell.input_size != expected_input {
                return Err(ForecastError::ShapeMismatch {
                    expected: format!("layer {} with input {} and hidden {}", i, expected_input, hidden_size),
                    actual: format!("input {} and hidden {}", cell.input_size, cell.hidden_size),
                });
            }
        }

        Ok(LSTMNetwork {
            num_layers: cells.len(),
            cells,
            input_size,
            hidden_size,
        })
    }

    /// Get reference to the cells (used for serialization)
    pub fn cells(&self) -> &[LSTMCell] {
        &self.cells
    }

    /// Get mutable reference to the cells
    pub fn cells_mut(&mut self) -> &mut [LSTMCell] {
        &mut self.cells
    }

    /// Zero state for every layer
    pub fn initial_state(&self, batch_size: usize) -> Vec<LayerState> {
        (0..self.num_layers)
            .map(|_| LayerState {
                h: Array2::zeros((self.hidden_size, batch_size)),
                c: Array2::zeros((self.hidden_size, batch_size)),
            })
            .collect()
    }

    /// Advances every layer by one step, returning the new states and the caches
    pub fn forward_step(&self, input: &Array2<f64>, states: &[LayerState]) -> (Vec<LayerState>, Vec<LSTMCellCache>) {
        let mut new_states = Vec::with_capacity(self.num_layers);
        let mut caches = Vec::with_capacity(self.num_layers);
        let mut layer_input = input.clone();

        for (cell, state) in self.cells.iter().zip(states) {
            let (h, c, cache) = cell.forward_with_cache(&layer_input, &state.h, &state.c);
            layer_input = h.clone();
            new_states.push(LayerState { h, c });
            caches.push(cache);
        }

        (new_states, caches)
    }

    /// Runs a window forward and returns the top layer's last hidden state
    ///
    /// Each element of `sequence` is one step shaped (input_size, batch).
    pub fn forward_sequence(&self, sequence: &[Array2<f64>]) -> Array2<f64> {
        let batch_size = sequence.first().map_or(0, |step| step.ncols());
        let mut states = self.initial_state(batch_size);

        for input in sequence {
            let mut layer_input = input.clone();
            for (cell, state) in self.cells.iter().zip(states.iter_mut()) {
                let (h, c) = cell.forward(&layer_input, &state.h, &state.c);
                layer_input = h.clone();
                *state = LayerState { h, c };
            }
        }

        states
            .pop()
            .map(|state| state.h)
            .unwrap_or_else(|| Array2::zeros((self.hidden_size, batch_size)))
    }

    /// Same as [`forward_sequence`](Self::forward_sequence) but keeps the caches for BPTT
    pub fn forward_sequence_with_cache(&self, sequence: &[Array2<f64>]) -> (Array2<f64>, SequenceCache) {
        let batch_size = sequence.first().map_or(0, |step| step.ncols());
        let mut states = self.initial_state(batch_size);
        let mut cache = SequenceCache {
            steps: Vec::with_capacity(sequence.len()),
        };

        for input in sequence {
            let (new_states, step_caches) = self.forward_step(input, &states);
            states = new_states;
            cache.steps.push(step_caches);
        }

        let last_hidden = states
            .pop()
            .map(|state| state.h)
            .unwrap_or_else(|| Array2::zeros((self.hidden_size, batch_size)));
        (last_hidden, cache)
    }

    /// Backpropagation through time from a gradient on the top layer's last hidden state
    ///
    /// Walks the steps in reverse, carrying each layer's hidden and cell
    /// gradients to the previous step and each step's input gradient down to
    /// the layer below. Returns the accumulated gradients in layer order.
    pub fn backward_sequence(&self, dh_last: &Array2<f64>, cache: &SequenceCache) -> Vec<LSTMCellGradients> {
        let mut gradients = self.zero_gradients();
        let batch_size = dh_last.ncols();
        let mut dh_next: Vec<Array2<f64>> = (0..self.num_layers)
            .map(|_| Array2::zeros((self.hidden_size, batch_size)))
            .collect();
        let mut dc_next = dh_next.clone();
        let last_step = cache.steps.len().saturating_sub(1);

        for (t, step_caches) in cache.steps.iter().enumerate().rev() {
            let mut dh_from_above = if t == last_step {
                dh_last.clone()
            } else {
                Array2::zeros((self.hidden_size, batch_size))
            };

            for layer in (0..self.num_layers).rev() {
                let dh = &dh_from_above + &dh_next[layer];
                let (step_gradients, dx, dhx, dcx) =
                    self.cells[layer].backward(&dh, &dc_next[layer], &step_caches[layer]);

                gradients[layer].accumulate(&step_gradients);
                dh_next[layer] = dhx;
                dc_next[layer] = dcx;
                dh_from_above = dx;
            }
        }

        gradients
    }

    /// Update parameters for all layers using computed gradients
    pub fn update_parameters<O: Optimizer + ?Sized>(&mut self, gradients: &[LSTMCellGradients], optimizer: &mut O) {
        for (i, (cell, cell_gradients)) in self.cells.iter_mut().zip(gradients).enumerate() {
            let prefix = format!("layer_{}", i);
            cell.update_parameters(cell_gradients, optimizer, &prefix);
        }
    }

    /// Initialize zero gradients for all layers
    pub fn zero_gradients(&self) -> Vec<LSTMCellGradients> {
        self.cells.iter().map(LSTMCell::zero_gradients).collect()
    }

    pub fn num_parameters(&self) -> usize {
        self.cells.iter().map(LSTMCell::num_parameters).sum()
    }
}
