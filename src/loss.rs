use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Loss function trait for training the forecaster
pub trait LossFunction {
    /// Compute the loss between predictions and targets
    fn compute_loss(&self, predictions: &Array2<f64>, targets: &Array2<f64>) -> f64;

    /// Compute the gradient of the loss with respect to predictions
    fn compute_gradient(&self, predictions: &Array2<f64>, targets: &Array2<f64>) -> Array2<f64>;
}

impl<L: LossFunction + ?Sized> LossFunction for Box<L> {
    fn compute_loss(&self, predictions: &Array2<f64>, targets: &Array2<f64>) -> f64 {
        (**self).compute_loss(predictions, targets)
    }

    fn compute_gradient(&self, predictions: &Array2<f64>, targets: &Array2<f64>) -> Array2<f64> {
        (**self).compute_gradient(predictions, targets)
    }
}

/// Mean Squared Error loss function
#[derive(Clone, Copy, Debug, Default)]
pub struct MSELoss;

impl LossFunction for MSELoss {
    fn compute_loss(&self, predictions: &Array2<f64>, targets: &Array2<f64>) -> f64 {
        let diff = predictions - targets;
        let squared_diff = &diff * &diff;
        squared_diff.sum() / (predictions.len() as f64)
    }

    fn compute_gradient(&self, predictions: &Array2<f64>, targets: &Array2<f64>) -> Array2<f64> {
        let diff = predictions - targets;
        2.0 * diff / (predictions.len() as f64)
    }
}

/// Mean Absolute Error loss function
#[derive(Clone, Copy, Debug, Default)]
pub struct MAELoss;

impl LossFunction for MAELoss {
    fn compute_loss(&self, predictions: &Array2<f64>, targets: &Array2<f64>) -> f64 {
        let diff = predictions - targets;
        diff.mapv(f64::abs).sum() / (predictions.len() as f64)
    }

    fn compute_gradient(&self, predictions: &Array2<f64>, targets: &Array2<f64>) -> Array2<f64> {
        let diff = predictions - targets;
        diff.mapv(|d| if d == 0.0 { 0.0 } else { d.signum() }) / (predictions.len() as f64)
    }
}

/// Loss selected by configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LossKind {
    #[default]
    Mse,
    Mae,
}

impl LossKind {
    pub fn build(self) -> Box<dyn LossFunction> {
        match self {
            LossKind::Mse => Box::new(MSELoss),
            LossKind::Mae => Box::new(MAELoss),
        }
    }
}

impl FromStr for LossKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mse" | "mean_squared_error" => Ok(LossKind::Mse),
            "mae" | "mean_absolute_error" => Ok(LossKind::Mae),
            other => Err(format!("unknown loss '{}', expected mse or mae", other)),
        }
    }
}

impl fmt::Display for LossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LossKind::Mse => write!(f, "mse"),
            LossKind::Mae => write!(f, "mae"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_mse_loss() {
        let loss_fn = MSELoss;
        let predictions = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let targets = arr2(&[[1.5, 2.5], [2.5, 3.5]]);

        let loss = loss_fn.compute_loss(&predictions, &targets);
        assert!((loss - 0.25).abs() < 1e-6);

        let gradient = loss_fn.compute_gradient(&predictions, &targets);
        assert_eq!(gradient.shape(), predictions.shape());
        assert!((gradient[[0, 0]] + 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_mae_loss() {
        let loss_fn = MAELoss;
        let predictions = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let targets = arr2(&[[1.5, 2.5], [2.5, 3.5]]);

        let loss = loss_fn.compute_loss(&predictions, &targets);
        assert!((loss - 0.5).abs() < 1e-6);

        let gradient = loss_fn.compute_gradient(&predictions, &targets);
        assert_eq!(gradient, arr2(&[[-0.25, -0.25], [0.25, 0.25]]));
    }

    #[test]
    fn test_mae_gradient_is_zero_on_exact_hits() {
        let predictions = arr2(&[[1.0, 2.0, 3.0]]);
        let targets = arr2(&[[1.0, 1.0, 4.0]]);

        let gradient = MAELoss.compute_gradient(&predictions, &targets);
        assert_eq!(gradient, arr2(&[[0.0, 1.0 / 3.0, -1.0 / 3.0]]));
    }

    #[test]
    fn test_loss_kind_parsing() {
        assert_eq!("mse".parse::<LossKind>().unwrap(), LossKind::Mse);
        assert_eq!("Mean_Absolute_Error".parse::<LossKind>().unwrap(), LossKind::Mae);
        assert!("huber".parse::<LossKind>().is_err());
    }

    #[test]
    fn test_boxed_loss_matches_concrete() {
        let predictions = arr2(&[[0.0, 1.0, 4.0]]);
        let targets = arr2(&[[1.0, 1.0, 1.0]]);
        let boxed = LossKind::Mae.build();

        assert_eq!(
            boxed.compute_loss(&predictions, &targets),
            MAELoss.compute_loss(&predictions, &targets)
        );
        assert!((LossKind::Mse.build().compute_loss(&predictions, &targets) - 10.0 / 3.0).abs() < 1e-12);
    }
}
