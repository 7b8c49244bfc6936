use ndarray::{Array2, Axis};
use rand::Rng;

use crate::optimizers::Optimizer;
use crate::utils::glorot_uniform;

/// Holds gradients for linear layer parameters during backpropagation
#[derive(Clone, Debug)]
pub struct LinearGradients {
    pub weight: Array2<f64>,
    pub bias: Array2<f64>,
}

/// Fully connected output layer
///
/// Performs the transformation: output = weight · input + bias
/// where weight has shape (output_size, input_size), bias has shape
/// (output_size, 1) and samples are the columns of the input.
#[derive(Clone, Debug)]
pub struct LinearLayer {
    pub weight: Array2<f64>,
    pub bias: Array2<f64>,
    pub input_size: usize,
    pub output_size: usize,
}

impl LinearLayer {
    /// Create a new linear layer with Glorot-uniform weights and zero bias
    pub fn new<R: Rng + ?Sized>(input_size: usize, output_size: usize, rng: &mut R) -> Self {
        Self {
            weight: glorot_uniform(output_size, input_size, rng),
            bias: Array2::zeros((output_size, 1)),
            input_size,
            output_size,
        }
    }

    /// Create a new linear layer with custom parameters
    pub fn from_weights(weight: Array2<f64>, bias: Array2<f64>) -> Self {
        let (output_size, input_size) = weight.dim();
        Self {
            weight,
            bias,
            input_size,
            output_size,
        }
    }

    /// Forward pass: (input_size, batch) -> (output_size, batch)
    pub fn forward(&self, input: &Array2<f64>) -> Array2<f64> {
        &self.weight.dot(input) + &self.bias
    }

    /// Backward pass given the input seen during the forward pass.
    ///
    /// Returns (parameter_gradients, input_gradient).
    pub fn backward(&self, input: &Array2<f64>, grad_output: &Array2<f64>) -> (LinearGradients, Array2<f64>) {
        let gradients = LinearGradients {
            weight: grad_output.dot(&input.t()),
            bias: grad_output.sum_axis(Axis(1)).insert_axis(Axis(1)),
        };
        let input_grad = self.weight.t().dot(grad_output);

        (gradients, input_grad)
    }

    /// Update parameters using the provided optimizer
    pub fn update_parameters<O: Optimizer + ?Sized>(&mut self, gradients: &LinearGradients, optimizer: &mut O, prefix: &str) {
        optimizer.update(&format!("{}_weight", prefix), &mut self.weight, &gradients.weight);
        optimizer.update(&format!("{}_bias", prefix), &mut self.bias, &gradients.bias);
    }

    /// Get the number of parameters in this layer
    pub fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizers::SGD;
    use ndarray::arr2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_linear_layer_creation() {
        let layer = LinearLayer::new(10, 1, &mut StdRng::seed_from_u64(0));
        assert_eq!(layer.weight.shape(), &[1, 10]);
        assert_eq!(layer.bias.shape(), &[1, 1]);
        assert_eq!(layer.num_parameters(), 11);
    }

    #[test]
    fn test_linear_layer_forward() {
        let layer = LinearLayer::from_weights(arr2(&[[1.0, 2.0]]), arr2(&[[0.5]]));
        let input = arr2(&[[1.0, 0.0], [1.0, 2.0]]);

        let output = layer.forward(&input);
        assert_eq!(output, arr2(&[[3.5, 4.5]]));
    }

    #[test]
    fn test_linear_layer_backward() {
        let layer = LinearLayer::from_weights(arr2(&[[1.0, 2.0]]), arr2(&[[0.0]]));
        let input = arr2(&[[1.0, 3.0], [2.0, 4.0]]);
        let grad_output = arr2(&[[1.0, 1.0]]);

        let (gradients, input_grad) = layer.backward(&input, &grad_output);

        assert_eq!(gradients.weight, arr2(&[[4.0, 6.0]]));
        assert_eq!(gradients.bias, arr2(&[[2.0]]));
        assert_eq!(input_grad, arr2(&[[1.0, 1.0], [2.0, 2.0]]));
    }

    #[test]
    fn test_linear_layer_with_optimizer() {
        let mut layer = LinearLayer::from_weights(arr2(&[[0.0, 0.0]]), arr2(&[[0.0]]));
        let mut optimizer = SGD::new(0.1);

        let input = arr2(&[[1.0], [2.0]]);
        let target = arr2(&[[3.0]]);
        let grad_output = &layer.forward(&input) - &target;
        let (gradients, _) = layer.backward(&input, &grad_output);
        layer.update_parameters(&gradients, &mut optimizer, "dense");

        let expected_weight = arr2(&[[0.3, 0.6]]);
        assert!((&layer.weight - &expected_weight).mapv(f64::abs).sum() < 1e-12);
        assert!((layer.bias[[0, 0]] - 0.3).abs() < 1e-12);
    }
}
