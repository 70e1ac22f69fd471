use ndarray::{Array2, ArrayView2};

use super::LossFn;
use crate::specs::LossFnSpec;

/// Mean absolute error loss function, less sensitive to outlier labels than `Mse`.
#[derive(Default, Clone, Copy, Debug)]
pub struct Mae;

impl Mae {
    /// Returns a new `Mae`.
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for Mae {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        (&y_pred - &y).mapv(f32::abs).mean().unwrap_or_default()
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let n = y_pred.len() as f32;

        (&y_pred - &y).mapv(|x| {
            if x > 0. {
                1. / n
            } else if x < 0. {
                -1. / n
            } else {
                0.
            }
        })
    }

    fn spec(&self) -> LossFnSpec {
        LossFnSpec::Mae
    }
}
