use ndarray::{linalg, prelude::*};

use crate::{MlErr, Result, arch::activations::ActFn};

/// A fully connected layer with an optional activation applied to its output.
///
/// The layer doesn't own its parameters, it receives a slice of `(dim.0 + 1) * dim.1` values
/// on each pass laid out as the row-major `dim.0 x dim.1` weight matrix followed by the
/// `dim.1` biases.
///
/// Optimizations:
///   1. Find a way to not copy `x` in each `Dense::forward` call.
#[derive(Clone, Debug)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    size: usize,

    // Forward metadata
    x: Array2<f32>,
    z: Array2<f32>,
    a: Array2<f32>,

    // Backward metadata
    d: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The input and output dimensions of the layer.
    /// * `act_fn` - The activation applied to the weighted sums, if any.
    ///
    /// # Returns
    /// A new `Dense` instance.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        let zeros = Array2::zeros((0, 0));

        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            act_fn,
            x: zeros.clone(),
            z: zeros.clone(),
            a: zeros.clone(),
            d: zeros,
        }
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the amount of weights this layer has, the rest of its parameters are biases.
    pub fn weights_size(&self) -> usize {
        self.dim.0 * self.dim.1
    }

    /// Computes the output of the layer for a batch of inputs.
    ///
    /// # Arguments
    /// * `params` - The parameters of this layer.
    /// * `x` - The input batch, one row per sample.
    ///
    /// # Returns
    /// A view of the layer's output or an error if the shapes don't match.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<ArrayView2<'_, f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense layer input",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = self.view_params(params)?;
        let shape = (x.nrows(), self.dim.1);

        if self.z.dim() != shape {
            self.z = Array2::zeros(shape);
        }

        linalg::general_mat_mul(1.0, &x, &w, 0.0, &mut self.z);
        self.z += &b;

        self.x = x.to_owned();

        let Some(ref act_fn) = self.act_fn else {
            return Ok(self.z.view());
        };

        if self.a.dim() != shape {
            self.a = Array2::zeros(shape);
        }

        self.a.zip_mut_with(&self.z, |a, &z| *a = act_fn.f(z));
        Ok(self.a.view())
    }

    /// Writes this layer's gradient and propagates the delta to the previous layer.
    ///
    /// # Arguments
    /// * `params` - The parameters of this layer.
    /// * `grad` - The gradient slice of this layer, it gets overwritten.
    /// * `d` - The derivative of the loss with respect to this layer's output.
    ///
    /// # Returns
    /// The derivative of the loss with respect to this layer's input.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: ArrayViewMut2<f32>,
    ) -> Result<ArrayViewMut2<'_, f32>> {
        if d.dim() != self.z.dim() {
            return Err(MlErr::SizeMismatch {
                what: "dense layer delta",
                got: d.len(),
                expected: self.z.len(),
            });
        }

        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(&self.z, |d, &z| *d *= act_fn.df(z));
        }

        let (mut dw, mut db) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &self.x.t(), &d, 0.0, &mut dw);
        db.assign(&d.sum_axis(Axis(0)));

        let (w, _) = self.view_params(params)?;
        let shape = (d.nrows(), self.dim.0);

        if self.d.dim() != shape {
            self.d = Array2::zeros(shape);
        }

        linalg::general_mat_mul(1.0, &d, &w.t(), 0.0, &mut self.d);
        Ok(self.d.view_mut())
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    ///
    /// # Arguments
    /// * `grad` - A gradient slice.
    ///
    /// # Returns
    /// A tuple containing the delta weights and delta biases.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_len("gradient", grad.len())?;

        let (dw_raw, db_raw) = grad.split_at_mut(self.weights_size());
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw)?;
        let db = ArrayViewMut1::from_shape(self.dim.1, db_raw)?;
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    ///
    /// # Arguments
    /// * `params` - A slice of parameters.
    ///
    /// # Returns
    /// A tuple containing the weights and biases.
    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len("parameters", params.len())?;

        let (w_raw, b_raw) = params.split_at(self.weights_size());
        let weights = ArrayView2::from_shape(self.dim, w_raw)?;
        let biases = ArrayView1::from_shape(self.dim.1, b_raw)?;
        Ok((weights, biases))
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        if got != self.size {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected: self.size,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_applies_weights_biases_and_activation() {
        // w = [[1, -1], [2, 0]], b = [0.5, -3]
        let params = [1., -1., 2., 0., 0.5, -3.];
        let mut dense = Dense::new((2, 2), Some(ActFn::relu()));

        let x = array![[1., 1.], [0., 2.]];
        let y = dense.forward(&params, x.view()).unwrap();

        assert_eq!(y, array![[3.5, 0.], [4.5, 0.]]);
    }

    #[test]
    fn backward_writes_the_gradient() {
        let params = [2., 1.];
        let mut grad = [0.; 2];
        let mut dense = Dense::new((1, 1), None);

        let x = array![[3.]];
        dense.forward(&params, x.view()).unwrap();

        let mut d = array![[0.5]];
        let d_prev = dense.backward(&params, &mut grad, d.view_mut()).unwrap();

        assert_eq!(grad, [1.5, 0.5]);
        assert_eq!(d_prev, array![[1.]]);
    }

    #[test]
    fn wrong_parameter_count_is_an_error() {
        let mut dense = Dense::new((2, 1), None);
        let x = array![[1., 1.]];

        assert!(dense.forward(&[1.], x.view()).is_err());
    }
}
