use ndarray::ArrayView2;

use crate::error::Result;

pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Makes a forward pass through the model.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input batch, one row per sample.
    ///
    /// # Returns
    /// The prediction for the given input or an error if occurred.
    fn forward<'x>(&'x mut self, params: &[f32], x: ArrayView2<'x, f32>)
    -> Result<ArrayView2<'x, f32>>;
}
