use ndarray::{Array2, ArrayView2};

use crate::specs::LossFnSpec;

/// A differentiable measure of the distance between a prediction and its target.
pub trait LossFn: Send {
    /// The mean loss over every element of the batch.
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32;

    /// The derivative of `loss` with respect to each element of `y_pred`.
    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32>;

    /// Returns the specification this loss function can be rebuilt from.
    fn spec(&self) -> LossFnSpec;
}

impl<T: LossFn + ?Sized> LossFn for Box<T> {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        (**self).loss(y_pred, y)
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        (**self).loss_prime(y_pred, y)
    }

    fn spec(&self) -> LossFnSpec {
        (**self).spec()
    }
}
