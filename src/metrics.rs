//! Error metrics over predictions in original units.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ForecastError, Result};

/// Mean squared error
pub fn mse(actual: ArrayView1<f64>, predicted: ArrayView1<f64>) -> f64 {
    let diff = &actual - &predicted;
    diff.mapv(|x| x * x).mean().unwrap_or(0.0)
}

pub fn rmse(actual: ArrayView1<f64>, predicted: ArrayView1<f64>) -> f64 {
    mse(actual, predicted).sqrt()
}

/// Mean absolute error
pub fn mae(actual: ArrayView1<f64>, predicted: ArrayView1<f64>) -> f64 {
    let diff = &actual - &predicted;
    diff.mapv(f64::abs).mean().unwrap_or(0.0)
}

/// Mean absolute percentage error, in percent.
///
/// Rows whose actual value is zero are skipped; `None` when every row is skipped.
pub fn mape(actual: ArrayView1<f64>, predicted: ArrayView1<f64>) -> Option<f64> {
    let (sum, count) = actual
        .iter()
        .zip(predicted.iter())
        .filter(|(a, _)| **a != 0.0)
        .fold((0.0, 0usize), |(sum, count), (a, p)| (sum + ((a - p) / a).abs(), count + 1));

    (count > 0).then(|| sum / count as f64 * 100.0)
}

/// Coefficient of determination; 0 for a constant actual series
pub fn r2_score(actual: ArrayView1<f64>, predicted: ArrayView1<f64>) -> f64 {
    let mean = actual.mean().unwrap_or(0.0);
    let ss_res: f64 = actual.iter().zip(predicted.iter()).map(|(a, p)| (a - p).powi(2)).sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        0.0
    } else {
        1.0 - ss_res / ss_tot
    }
}

/// Summary of prediction quality
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub mape: Option<f64>,
    pub r2: f64,
    pub samples: usize,
}

impl ForecastMetrics {
    pub fn compute(actual: ArrayView1<f64>, predicted: ArrayView1<f64>) -> Result<Self> {
        if actual.len() != predicted.len() {
            return Err(ForecastError::ShapeMismatch {
                expected: format!("{} predictions", actual.len()),
                actual: format!("{} predictions", predicted.len()),
            });
        }
        if actual.is_empty() {
            return Err(ForecastError::InsufficientData("no predictions to score".to_string()));
        }

        let mse = mse(actual, predicted);
        Ok(ForecastMetrics {
            mse,
            rmse: mse.sqrt(),
            mae: mae(actual, predicted),
            mape: mape(actual, predicted),
            r2: r2_score(actual, predicted),
            samples: actual.len(),
        })
    }
}

impl fmt::Display for ForecastMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RMSE {:.4}  MAE {:.4}  ", self.rmse, self.mae)?;
        match self.mape {
            Some(mape) => write!(f, "MAPE {:.2}%  ", mape)?,
            None => write!(f, "MAPE n/a  ")?,
        }
        write!(f, "R² {:.4}  ({} samples)", self.r2, self.samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn test_error_metrics() {
        let actual = arr1(&[1.0, 2.0, 4.0]);
        let predicted = arr1(&[2.0, 2.0, 2.0]);

        assert!((mse(actual.view(), predicted.view()) - 5.0 / 3.0).abs() < 1e-12);
        assert!((mae(actual.view(), predicted.view()) - 1.0).abs() < 1e-12);
        assert!((rmse(actual.view(), predicted.view()) - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
        // (100% + 0% + 50%) / 3
        assert!((mape(actual.view(), predicted.view()).unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_mape_skips_zero_actuals() {
        let actual = arr1(&[0.0, 10.0]);
        let predicted = arr1(&[5.0, 11.0]);
        assert!((mape(actual.view(), predicted.view()).unwrap() - 10.0).abs() < 1e-9);

        let zeros = arr1(&[0.0, 0.0]);
        assert_eq!(mape(zeros.view(), predicted.view()), None);
    }

    #[test]
    fn test_perfect_prediction() {
        let actual = arr1(&[3.0, 1.0, 2.0]);
        let metrics = ForecastMetrics::compute(actual.view(), actual.view()).unwrap();

        assert_eq!(metrics.mse, 0.0);
        assert_eq!(metrics.mae, 0.0);
        assert_eq!(metrics.r2, 1.0);
        assert_eq!(metrics.samples, 3);
        assert!(metrics.to_string().contains("RMSE 0.0000"));
    }

    #[test]
    fn test_compute_rejects_mismatched_lengths() {
        let actual = arr1(&[1.0, 2.0]);
        let predicted = arr1(&[1.0]);
        assert!(ForecastMetrics::compute(actual.view(), predicted.view()).is_err());
        assert!(ForecastMetrics::compute(actual.slice(ndarray::s![..0]), predicted.slice(ndarray::s![..0])).is_err());
    }
}
