use crate::{MlErr, Result, specs::OptimizerSpec};

/// Defines the strategy for updating model parameters based on calculated gradients.
pub trait Optimizer: Send {
    /// Updates the provided slice of parameters using the gradient.
    ///
    /// # Arguments
    /// * `grad` - A reference to the model's gradient.
    /// * `params` - The parameters to update.
    ///
    /// # Returns
    /// An error if there's a mismatch in the sizes of `grad` and `params`.
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()>;

    /// Returns the specification (kind and hyperparameters) of this optimizer.
    fn spec(&self) -> OptimizerSpec;

    /// Returns the named internal buffers this optimizer accumulates between steps.
    fn state(&self) -> Vec<(&'static str, Vec<f32>)> {
        Vec::new()
    }

    /// Restores one of the buffers returned by `state`.
    ///
    /// # Arguments
    /// * `name` - The name of the buffer.
    /// * `values` - The values to restore.
    ///
    /// # Returns
    /// An error if the buffer is unknown or its length doesn't match.
    fn load_state(&mut self, name: &str, values: &[f32]) -> Result<()> {
        let _ = values;

        Err(MlErr::UnknownOptimizerState {
            optimizer: self.spec().name(),
            name: name.to_string(),
        })
    }
}

impl<T: Optimizer + ?Sized> Optimizer for Box<T> {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        (**self).update_params(grad, params)
    }

    fn spec(&self) -> OptimizerSpec {
        (**self).spec()
    }

    fn state(&self) -> Vec<(&'static str, Vec<f32>)> {
        (**self).state()
    }

    fn load_state(&mut self, name: &str, values: &[f32]) -> Result<()> {
        (**self).load_state(name, values)
    }
}

/// Checks that a gradient, or a restored buffer, has the expected length.
pub(super) fn check_len(what: &'static str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(MlErr::SizeMismatch {
            what,
            got,
            expected,
        });
    }

    Ok(())
}
