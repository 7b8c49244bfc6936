/// Module for stacked LSTM networks.
pub mod lstm_network;

/// Module for the next-value forecaster (LSTM stack + dense head).
pub mod forecaster;
