//! Actual vs. predicted line charts.

use ndarray::ArrayView1;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;

use crate::error::{ForecastError, Result};

/// Labels and size of a chart
#[derive(Clone, Debug, PartialEq)]
pub struct PlotSpec {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub width: u32,
    pub height: u32,
}

impl PlotSpec {
    pub fn for_target(target: &str) -> Self {
        PlotSpec {
            title: format!("{} Actual vs. Predicted", target),
            x_label: "Time Step".to_string(),
            y_label: target.to_string(),
            width: 1200,
            height: 600,
        }
    }
}

/// y-axis bounds covering every value with a 10% margin
pub fn value_range(series: &[ArrayView1<f64>]) -> (f64, f64) {
    let (min, max) = series
        .iter()
        .flat_map(|s| s.iter())
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    if min > max {
        return (0.0, 1.0);
    }
    let margin = if max > min {
        (max - min) * 0.1
    } else {
        min.abs().max(1.0) * 0.1
    };
    (min - margin, max + margin)
}

/// Draws actual and predicted values against the time-step index.
///
/// A `.svg` path is rendered as SVG, anything else as a bitmap whose format
/// follows the extension.
pub fn plot_predictions<P: AsRef<Path>>(
    path: P,
    spec: &PlotSpec,
    actual: ArrayView1<f64>,
    predicted: ArrayView1<f64>,
) -> Result<()> {
    if actual.len() != predicted.len() {
        return Err(ForecastError::ShapeMismatch {
            expected: format!("{} predicted values", actual.len()),
            actual: format!("{} predicted values", predicted.len()),
        });
    }
    if actual.is_empty() {
        return Err(ForecastError::InsufficientData("nothing to plot".to_string()));
    }

    let path = path.as_ref();
    let size = (spec.width, spec.height);
    let svg = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("svg"));

    if svg {
        let root = SVGBackend::new(path, size).into_drawing_area();
        draw(&root, spec, actual, predicted)?;
    } else {
        let root = BitMapBackend::new(path, size).into_drawing_area();
        draw(&root, spec, actual, predicted)?;
    }

    tracing::debug!(path = %path.display(), points = actual.len(), "chart written");
    Ok(())
}

fn draw<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    spec: &PlotSpec,
    actual: ArrayView1<f64>,
    predicted: ArrayView1<f64>,
) -> Result<()> {
    root.fill(&WHITE).map_err(plot_error)?;

    let (low, high) = value_range(&[actual.view(), predicted.view()]);
    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, ("sans-serif", 32))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0..actual.len(), low..high)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_desc(spec.x_label.clone())
        .y_desc(spec.y_label.clone())
        .draw()
        .map_err(plot_error)?;

    chart
        .draw_series(LineSeries::new(actual.iter().enumerate().map(|(i, &v)| (i, v)), &BLUE))
        .map_err(plot_error)?
        .label("Actual")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

    chart
        .draw_series(LineSeries::new(predicted.iter().enumerate().map(|(i, &v)| (i, v)), &RED))
        .map_err(plot_error)?
        .label("Predicted")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_error)?;

    root.present().map_err(plot_error)?;
    Ok(())
}

fn plot_error<E: std::fmt::Display>(error: E) -> ForecastError {
    ForecastError::Plot(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;
    use tempfile::tempdir;

    #[test]
    fn test_value_range_pads_both_ends() {
        let a = arr1(&[1.0, 3.0]);
        let b = arr1(&[2.0, 5.0]);
        let (low, high) = value_range(&[a.view(), b.view()]);
        assert!((low - 0.6).abs() < 1e-12);
        assert!((high - 5.4).abs() < 1e-12);
    }

    #[test]
    fn test_value_range_of_constant_series() {
        let a = arr1(&[4.0, 4.0]);
        let (low, high) = value_range(&[a.view()]);
        assert!(low < 4.0 && high > 4.0);
        assert_eq!(value_range(&[]), (0.0, 1.0));
    }

    #[test]
    fn test_spec_labels() {
        let spec = PlotSpec::for_target("US_VIX");
        assert_eq!(spec.title, "US_VIX Actual vs. Predicted");
        assert_eq!(spec.x_label, "Time Step");
        assert_eq!(spec.y_label, "US_VIX");
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let dir = tempdir().unwrap();
        let actual = arr1(&[1.0, 2.0]);
        let predicted = arr1(&[1.0]);
        let result = plot_predictions(
            dir.path().join("chart.svg"),
            &PlotSpec::for_target("x"),
            actual.view(),
            predicted.view(),
        );
        assert!(matches!(result, Err(ForecastError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_bitmap_chart_is_written_or_reports_a_plot_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chart.png");
        let actual = arr1(&[3.0, 2.5, 4.0]);
        let predicted = arr1(&[2.8, 2.9, 3.6]);

        match plot_predictions(&path, &PlotSpec::for_target("y"), actual.view(), predicted.view()) {
            Ok(()) => assert!(std::fs::metadata(&path).unwrap().len() > 0),
            Err(err) => assert!(matches!(err, ForecastError::Plot(_))),
        }
    }

    #[test]
    fn test_svg_chart_is_written_or_reports_a_plot_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chart.svg");
        let actual = arr1(&[1.0, 2.0, 1.5, 3.0]);
        let predicted = arr1(&[1.1, 1.8, 1.7, 2.6]);

        // Text layout needs a system font; headless machines may have none.
        match plot_predictions(&path, &PlotSpec::for_target("x"), actual.view(), predicted.view()) {
            Ok(()) => {
                let svg = std::fs::read_to_string(&path).unwrap();
                assert!(svg.contains("<svg"));
            }
            Err(err) => assert!(matches!(err, ForecastError::Plot(_))),
        }
    }
}
