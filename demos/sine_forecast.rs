use chrono::{Duration, NaiveDate};
use csv::Writer;
use lstm_forecast::{ForecastConfig, ForecastPipeline, SavedForecaster, TimeSeries};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // Two years of a noisy daily seasonal signal
    let dir = tempfile::tempdir()?;
    let csv_path = dir.path().join("sine.csv");
    let mut rng = StdRng::seed_from_u64(7);
    let noise = Normal::new(0.0, 0.05)?;
    let start = NaiveDate::from_ymd_opt(2022, 1, 1).ok_or("bad start date")?;

    let mut writer = Writer::from_path(&csv_path)?;
    writer.write_record(["Date", "Value"])?;
    for day in 0..730 {
        let t = day as f64 * 2.0 * std::f64::consts::PI / 30.0;
        let value = 100.0 + 10.0 * t.sin() + noise.sample(&mut rng) * 10.0;
        let date = start + Duration::days(day);
        writer.write_record([date.format("%Y-%m-%d").to_string(), format!("{:.4}", value)])?;
    }
    writer.flush()?;

    let mut config = ForecastConfig::default();
    config.seq_length = 20;
    config.model.hidden_size = 16;
    config.training.epochs = 15;
    config.training.log_every = 5;
    config.learning_rate = 0.005;
    config.seed = Some(1);

    let report = ForecastPipeline::new(config)?.run(&csv_path)?;
    println!("Test windows: {}", report.test_windows);
    println!("Test loss:    {:.6}", report.test_loss);
    println!("Metrics:      {}", report.metrics);

    for (date, (actual, predicted)) in report
        .timestamps
        .iter()
        .zip(report.actual.iter().zip(report.predicted.iter()))
        .take(5)
    {
        println!("{}  actual {:8.3}  predicted {:8.3}", date.date(), actual, predicted);
    }

    // Reload the model and forecast the day after the series ends
    let model_path = dir.path().join("sine_model.json");
    report.model.save(&model_path)?;
    let bundle = SavedForecaster::load(&model_path)?;
    let series = TimeSeries::from_csv(&csv_path, &bundle.data_config())?;
    let prediction = bundle.predict_series(&series)?;
    println!("Next value:   {:.3}", prediction.next);

    let chart = std::env::current_dir()?.join("sine_forecast.svg");
    match report.plot(&chart) {
        Ok(()) => println!("Chart:        {}", chart.display()),
        Err(err) => println!("Chart skipped: {}", err),
    }

    Ok(())
}
