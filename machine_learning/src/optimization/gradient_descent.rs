use super::{Optimizer, optimizer::check_len};
use crate::{Result, specs::OptimizerSpec};

/// Gradient descent optimization algorithm.
#[derive(Debug)]
pub struct GradientDescent {
    learning_rate: f32,
}

impl GradientDescent {
    /// Creates a new `GradientDescent` optimizer.
    ///
    /// # Arguments
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    ///
    /// # Returns
    /// A new `GradientDescent` instance.
    pub fn new(learning_rate: f32) -> Self {
        Self { learning_rate }
    }
}

impl Optimizer for GradientDescent {
    /// Makes a step in the opposite direction of the gradient, with a length of `learning_rate`.
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_len("gradient", grad.len(), params.len())?;

        let lr = self.learning_rate;

        for (p, g) in params.iter_mut().zip(grad) {
            *p -= lr * g;
        }

        Ok(())
    }

    fn spec(&self) -> OptimizerSpec {
        OptimizerSpec::GradientDescent {
            learning_rate: self.learning_rate,
        }
    }
}
