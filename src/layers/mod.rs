/// LSTM cell with batched forward and backward passes.
pub mod lstm_cell;

/// Dense output layer.
pub mod linear;
