use ndarray::{Array2, ArrayView2, ArrayViewMut2};

use super::{Model, layers::Layer, loss::LossFn};
use crate::{MlErr, Result, optimization::Optimizer};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// The parameters of every layer live in a single flat slice owned by the caller, each layer
/// takes its chunk in order.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    /// Runs a single optimization step over one batch.
    ///
    /// # Arguments
    /// * `params` - The model's parameters, updated in place.
    /// * `grad` - A buffer for the gradient, overwritten.
    /// * `loss_fn` - The loss function.
    /// * `optimizer` - The optimizer that updates `params` with the computed gradient.
    /// * `x` - The input batch.
    /// * `y` - The expected output for the batch.
    ///
    /// # Returns
    /// The batch loss and the predictions made before updating the parameters.
    pub fn train_batch<L, O>(
        &mut self,
        params: &mut [f32],
        grad: &mut [f32],
        loss_fn: &L,
        optimizer: &mut O,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
    ) -> Result<(f32, Array2<f32>)>
    where
        L: LossFn + ?Sized,
        O: Optimizer + ?Sized,
    {
        self.check_size("gradient", grad.len())?;

        let (loss, mut d_last, y_pred) = {
            let y_pred = self.forward(params, x)?;

            if y_pred.dim() != y.dim() {
                return Err(MlErr::SizeMismatch {
                    what: "targets",
                    got: y.len(),
                    expected: y_pred.len(),
                });
            }

            let loss = loss_fn.loss(y_pred, y);
            (loss, loss_fn.loss_prime(y_pred, y), y_pred.to_owned())
        };

        grad.fill(0.);
        self.backward(params, grad, d_last.view_mut())?;
        optimizer.update_params(grad, params)?;

        Ok((loss, y_pred))
    }

    /// Walks the layers in reverse, writing each layer's chunk of `grad`.
    fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d_last: ArrayViewMut2<f32>,
    ) -> Result<()> {
        let mut end = params.len();
        let mut d = d_last;

        for layer in self.layers.iter_mut().rev() {
            let start = end - layer.size();
            d = layer.backward(&params[start..end], &mut grad[start..end], d)?;
            end = start;
        }

        Ok(())
    }

    fn check_size(&self, what: &'static str, got: usize) -> Result<()> {
        let expected = self.size();

        if got != expected {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected,
            });
        }

        Ok(())
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.layers.iter().map(|layer| layer.size()).sum()
    }

    fn forward<'x>(
        &'x mut self,
        params: &[f32],
        mut x: ArrayView2<'x, f32>,
    ) -> Result<ArrayView2<'x, f32>> {
        self.check_size("parameters", params.len())?;

        let mut start = 0;

        for layer in self.layers.iter_mut() {
            let end = start + layer.size();
            x = layer.forward(&params[start..end], x)?;
            start = end;
        }

        Ok(x)
    }
}
