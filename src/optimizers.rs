use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Optimizer trait for parameter updates during training
pub trait Optimizer {
    fn update(&mut self, param_id: &str, param: &mut Array2<f64>, gradient: &Array2<f64>);
    fn reset(&mut self);
}

impl<O: Optimizer + ?Sized> Optimizer for Box<O> {
    fn update(&mut self, param_id: &str, param: &mut Array2<f64>, gradient: &Array2<f64>) {
        (**self).update(param_id, param, gradient);
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}

/// Stochastic Gradient Descent: θ = θ - η∇θ
pub struct SGD {
    learning_rate: f64,
}

impl SGD {
    pub fn new(learning_rate: f64) -> Self {
        SGD { learning_rate }
    }
}

impl Optimizer for SGD {
    fn update(&mut self, _param_id: &str, param: &mut Array2<f64>, gradient: &Array2<f64>) {
        param.scaled_add(-self.learning_rate, gradient);
    }

    fn reset(&mut self) {}
}

/// Per-parameter Adam state
struct Moments {
    m: Array2<f64>,
    v: Array2<f64>,
    t: i32,
}

/// Adam optimizer with adaptive learning rates
///
/// Implements: m_t = β₁m_{t-1} + (1-β₁)g_t
///             v_t = β₂v_{t-1} + (1-β₂)g_t²
///             θ_t = θ_{t-1} - η * m̂_t / (√v̂_t + ε)
/// where m̂_t and v̂_t are bias-corrected estimates. The step counter is
/// kept per parameter so bias correction follows the number of updates
/// each parameter has actually received.
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    state: HashMap<String, Moments>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Adam::with_params(learning_rate, 0.9, 0.999, 1e-7)
    }

    pub fn with_params(learning_rate: f64, beta1: f64, beta2: f64, epsilon: f64) -> Self {
        Adam {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            state: HashMap::new(),
        }
    }
}

impl Optimizer for Adam {
    fn update(&mut self, param_id: &str, param: &mut Array2<f64>, gradient: &Array2<f64>) {
        let moments = self.state.entry(param_id.to_string()).or_insert_with(|| Moments {
            m: Array2::zeros(param.raw_dim()),
            v: Array2::zeros(param.raw_dim()),
            t: 0,
        });
        moments.t += 1;

        let (beta1, beta2) = (self.beta1, self.beta2);
        moments.m.zip_mut_with(gradient, |m, &g| *m = beta1 * *m + (1.0 - beta1) * g);
        moments.v.zip_mut_with(gradient, |v, &g| *v = beta2 * *v + (1.0 - beta2) * g * g);

        let m_correction = 1.0 - beta1.powi(moments.t);
        let v_correction = 1.0 - beta2.powi(moments.t);
        let (lr, eps) = (self.learning_rate, self.epsilon);

        ndarray::Zip::from(param)
            .and(&moments.m)
            .and(&moments.v)
            .for_each(|p, &m, &v| {
                let m_hat = m / m_correction;
                let v_hat = v / v_correction;
                *p -= lr * m_hat / (v_hat.sqrt() + eps);
            });
    }

    fn reset(&mut self) {
        self.state.clear();
    }
}

/// RMSprop: v_t = αv_{t-1} + (1-α)g_t²
///          θ_t = θ_{t-1} - η * g_t / (√v_t + ε)
pub struct RMSprop {
    learning_rate: f64,
    alpha: f64,
    epsilon: f64,
    v: HashMap<String, Array2<f64>>,
}

impl RMSprop {
    pub fn new(learning_rate: f64) -> Self {
        RMSprop::with_params(learning_rate, 0.9, 1e-7)
    }

    pub fn with_params(learning_rate: f64, alpha: f64, epsilon: f64) -> Self {
        RMSprop {
            learning_rate,
            alpha,
            epsilon,
            v: HashMap::new(),
        }
    }
}

impl Optimizer for RMSprop {
    fn update(&mut self, param_id: &str, param: &mut Array2<f64>, gradient: &Array2<f64>) {
        let v_t = self
            .v
            .entry(param_id.to_string())
            .or_insert_with(|| Array2::zeros(param.raw_dim()));

        let alpha = self.alpha;
        v_t.zip_mut_with(gradient, |v, &g| *v = alpha * *v + (1.0 - alpha) * g * g);

        let (lr, eps) = (self.learning_rate, self.epsilon);
        ndarray::Zip::from(param)
            .and(gradient)
            .and(&*v_t)
            .for_each(|p, &g, &v| *p -= lr * g / (v.sqrt() + eps));
    }

    fn reset(&mut self) {
        self.v.clear();
    }
}

/// Optimizer selected by configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    #[default]
    Adam,
    Sgd,
    Rmsprop,
}

impl OptimizerKind {
    pub fn build(self, learning_rate: f64) -> Box<dyn Optimizer> {
        match self {
            OptimizerKind::Adam => Box::new(Adam::new(learning_rate)),
            OptimizerKind::Sgd => Box::new(SGD::new(learning_rate)),
            OptimizerKind::Rmsprop => Box::new(RMSprop::new(learning_rate)),
        }
    }
}

impl FromStr for OptimizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "adam" => Ok(OptimizerKind::Adam),
            "sgd" => Ok(OptimizerKind::Sgd),
            "rmsprop" => Ok(OptimizerKind::Rmsprop),
            other => Err(format!("unknown optimizer '{}', expected adam, sgd or rmsprop", other)),
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptimizerKind::Adam => "adam",
            OptimizerKind::Sgd => "sgd",
            OptimizerKind::Rmsprop => "rmsprop",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_sgd_optimizer() {
        let mut optimizer = SGD::new(0.1);
        let mut param = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let gradient = arr2(&[[0.1, 0.2], [0.3, 0.4]]);

        let original_param = param.clone();
        optimizer.update("test_param", &mut param, &gradient);

        let expected = &original_param - 0.1 * &gradient;
        assert!((param - expected).mapv(f64::abs).sum() < 1e-10);
    }

    #[test]
    fn test_adam_first_step_moves_by_learning_rate() {
        // With bias correction the first Adam step is ±lr for every non-zero gradient
        let mut optimizer = Adam::new(0.001);
        let mut param = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let gradient = arr2(&[[0.1, -0.2], [0.3, 0.4]]);

        optimizer.update("w", &mut param, &gradient);

        assert!((param[[0, 0]] - 0.999).abs() < 1e-6);
        assert!((param[[0, 1]] - 2.001).abs() < 1e-6);
        assert!((param[[1, 1]] - 3.999).abs() < 1e-6);
    }

    #[test]
    fn test_adam_step_counter_is_per_parameter() {
        let mut optimizer = Adam::new(0.01);
        let gradient = arr2(&[[1.0]]);
        let mut a = arr2(&[[0.0]]);
        let mut b = arr2(&[[0.0]]);

        optimizer.update("a", &mut a, &gradient);
        optimizer.update("b", &mut b, &gradient);

        assert!((a[[0, 0]] - b[[0, 0]]).abs() < 1e-15);
    }

    #[test]
    fn test_rmsprop_optimizer() {
        let mut optimizer = RMSprop::new(0.01);
        let mut param = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let gradient = arr2(&[[0.1, 0.2], [0.3, 0.4]]);

        let original_param = param.clone();
        optimizer.update("test_param", &mut param, &gradient);

        assert!((&param - &original_param).mapv(f64::abs).sum() > 1e-10);
        assert!(param.iter().zip(original_param.iter()).all(|(p, o)| p < o));
    }

    #[test]
    fn test_boxed_optimizer_dispatch() {
        let mut optimizer = OptimizerKind::Sgd.build(0.5);
        let mut param = arr2(&[[1.0]]);
        optimizer.update("p", &mut param, &arr2(&[[1.0]]));
        assert!((param[[0, 0]] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_optimizer_kind_parsing() {
        assert_eq!("ADAM".parse::<OptimizerKind>().unwrap(), OptimizerKind::Adam);
        assert_eq!("rmsprop".parse::<OptimizerKind>().unwrap(), OptimizerKind::Rmsprop);
        assert!("lbfgs".parse::<OptimizerKind>().is_err());
    }
}
