//! Command-line front end: train a forecaster on a CSV file, or apply a
//! saved one to new data.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use lstm_forecast::{
    ForecastConfig, ForecastPipeline, LossKind, MissingValuePolicy, OptimizerKind, PlotSpec, SavedForecaster,
    SplitStrategy, TimeSeries,
};

/// Next-value time series forecasting with stacked LSTM networks
#[derive(Parser, Debug)]
#[command(name = "lstm-forecast")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log debug output (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train on the leading part of a series and evaluate on the rest
    Train(TrainCommand),

    /// Predict a series with a saved model
    Predict(PredictCommand),
}

#[derive(Args, Debug)]
struct TrainCommand {
    /// CSV file with a date column and numeric columns
    #[arg(long, short = 'i')]
    input: PathBuf,

    /// JSON configuration; flags below override it
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Column to predict (default: first feature column)
    #[arg(long)]
    target: Option<String>,

    /// Comma-separated feature columns (default: every non-date column)
    #[arg(long, value_delimiter = ',')]
    columns: Option<Vec<String>>,

    /// Name of the date column
    #[arg(long)]
    date_column: Option<String>,

    #[arg(long)]
    seq_length: Option<usize>,

    #[arg(long)]
    epochs: Option<usize>,

    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long)]
    hidden_size: Option<usize>,

    /// Number of stacked LSTM layers
    #[arg(long)]
    layers: Option<usize>,

    #[arg(long)]
    learning_rate: Option<f64>,

    /// Fraction of rows used for training
    #[arg(long)]
    train_ratio: Option<f64>,

    /// split-then-window or window-then-split
    #[arg(long)]
    split: Option<SplitStrategy>,

    /// reject, zero or forward
    #[arg(long)]
    missing: Option<MissingValuePolicy>,

    /// adam, sgd or rmsprop
    #[arg(long)]
    optimizer: Option<OptimizerKind>,

    /// mse or mae
    #[arg(long)]
    loss: Option<LossKind>,

    /// Validate on the test windows instead of a training hold-out
    #[arg(long)]
    validate_on_test: bool,

    #[arg(long)]
    seed: Option<u64>,

    /// Chart of actual vs. predicted test values (.png or .svg)
    #[arg(long, default_value = "forecast.png")]
    plot: PathBuf,

    /// Skip the chart
    #[arg(long)]
    no_plot: bool,

    /// Write date,actual,predicted rows for the test period
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Save the trained model (.json, anything else is binary)
    #[arg(long)]
    save_model: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PredictCommand {
    /// Model written by `train --save-model`
    #[arg(long, short = 'm')]
    model: PathBuf,

    #[arg(long, short = 'i')]
    input: PathBuf,

    #[arg(long)]
    plot: Option<PathBuf>,

    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Train(cmd) => cmd.run(),
        Commands::Predict(cmd) => cmd.run(),
    }
}

impl TrainCommand {
    fn build_config(&self) -> Result<ForecastConfig> {
        let mut config = match &self.config {
            Some(path) => ForecastConfig::from_json_file(path)
                .with_context(|| format!("failed to read config {}", path.display()))?,
            None => ForecastConfig::default(),
        };

        if let Some(target) = &self.target {
            config.data.target = Some(target.clone());
        }
        if let Some(columns) = &self.columns {
            config.data.columns = Some(columns.clone());
        }
        if let Some(date_column) = &self.date_column {
            config.data.date_column = date_column.clone();
        }
        if let Some(missing) = self.missing {
            config.data.missing = missing;
        }
        if let Some(seq_length) = self.seq_length {
            config.seq_length = seq_length;
        }
        if let Some(epochs) = self.epochs {
            config.training.epochs = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            config.training.batch_size = batch_size;
        }
        if let Some(hidden_size) = self.hidden_size {
            config.model.hidden_size = hidden_size;
        }
        if let Some(layers) = self.layers {
            config.model.num_layers = layers;
        }
        if let Some(learning_rate) = self.learning_rate {
            config.learning_rate = learning_rate;
        }
        if let Some(train_ratio) = self.train_ratio {
            config.train_ratio = train_ratio;
        }
        if let Some(split) = self.split {
            config.split = split;
        }
        if let Some(optimizer) = self.optimizer {
            config.optimizer = optimizer;
        }
        if let Some(loss) = self.loss {
            config.loss = loss;
        }
        if self.validate_on_test {
            config.validate_on_test = true;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }

        Ok(config)
    }

    fn run(self) -> Result<()> {
        let config = self.build_config()?;
        let pipeline = ForecastPipeline::new(config).context("invalid configuration")?;

        info!(input = %self.input.display(), "loading series");
        let report = pipeline
            .run(&self.input)
            .with_context(|| format!("forecasting {} failed", self.input.display()))?;

        println!("Rows:            {}", report.rows);
        println!("Target:          {}", report.target);
        println!("Train windows:   {}", report.train_windows);
        println!("Test windows:    {}", report.test_windows);
        if let Some(last) = report.history.last() {
            println!("Final loss:      {:.6} after {} epochs", last.train_loss, last.epoch);
        }
        println!("Test loss:       {:.6}", report.test_loss);
        println!("Test metrics:    {}", report.metrics);

        if !self.no_plot {
            report
                .plot(&self.plot)
                .with_context(|| format!("failed to draw {}", self.plot.display()))?;
            println!("Chart:           {}", self.plot.display());
        }
        if let Some(path) = &self.output {
            report
                .write_csv(path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Predictions:     {}", path.display());
        }
        if let Some(path) = &self.save_model {
            report
                .model
                .save(path)
                .with_context(|| format!("failed to save model to {}", path.display()))?;
            println!("Model:           {}", path.display());
        }

        Ok(())
    }
}

impl PredictCommand {
    fn run(self) -> Result<()> {
        let bundle = SavedForecaster::load(&self.model)
            .with_context(|| format!("failed to load model {}", self.model.display()))?;
        info!(
            model = %bundle.metadata.model_name,
            target = %bundle.metadata.target,
            trained_epochs = bundle.metadata.total_epochs,
            "loaded model"
        );

        let series = TimeSeries::from_csv(&self.input, &bundle.data_config())
            .with_context(|| format!("failed to load {}", self.input.display()))?;
        let prediction = bundle
            .predict_series(&series)
            .context("prediction failed")?;
        let metrics = lstm_forecast::ForecastMetrics::compute(prediction.actual.view(), prediction.predicted.view())?;

        println!("Rows:            {}", series.len());
        println!("Predicted rows:  {}", prediction.predicted.len());
        println!("Metrics:         {}", metrics);
        match series.timestamps().last() {
            Some(last) => println!("Next after {}: {:.4}", last, prediction.next),
            None => println!("Next:            {:.4}", prediction.next),
        }

        if let Some(path) = &self.plot {
            draw(path, &bundle.metadata.target, &prediction)?;
        }
        if let Some(path) = &self.output {
            lstm_forecast::data::write_predictions_csv(
                path,
                &prediction.timestamps,
                prediction.actual.view(),
                prediction.predicted.view(),
            )
            .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Predictions:     {}", path.display());
        }

        Ok(())
    }
}

fn draw(path: &Path, target: &str, prediction: &lstm_forecast::SeriesPrediction) -> Result<()> {
    lstm_forecast::plot_predictions(
        path,
        &PlotSpec::for_target(target),
        prediction.actual.view(),
        prediction.predicted.view(),
    )
    .with_context(|| format!("failed to draw {}", path.display()))?;
    println!("Chart:           {}", path.display());
    Ok(())
}
