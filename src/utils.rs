/// Activation and initialization helpers shared by the layers.
use ndarray::Array2;
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::Uniform;

/// Sigmoid activation function: σ(x) = 1 / (1 + e^(-x))
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Derivative of tanh expressed through its output: 1 - tanh(x)^2
pub fn tanh_derivative(tanh_x: f64) -> f64 {
    1.0 - tanh_x * tanh_x
}

/// Glorot/Xavier uniform initialization: U(-limit, limit) with
/// limit = sqrt(6 / (fan_in + fan_out))
pub fn glorot_uniform<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Array2<f64> {
    let limit = (6.0 / (rows + cols) as f64).sqrt();
    Array2::random_using((rows, cols), Uniform::new_inclusive(-limit, limit), rng)
}
