use std::{cell::RefCell, rc::Rc};

use machine_learning::{
    MlErr,
    arch::{Model, Sequential, activations::ActFn, layers::Layer, loss::LossFn},
    initialization::{ChainedParamGen, ConstParamGen, ParamGen, RandParamGen},
    optimization::Optimizer,
};
use ndarray::{Array2, ArrayView2};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{NnueErr, Result};

/// The shape of the network: `input -> hidden[0] -> ... -> 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub input: usize,
    pub hidden: Vec<usize>,
}

impl Topology {
    pub fn new(input: usize, hidden: Vec<usize>) -> Self {
        Self { input, hidden }
    }

    /// Returns the `(in, out)` dimensions of every linear layer, in forward order.
    pub fn dims(&self) -> Vec<(usize, usize)> {
        let widths: Vec<_> = std::iter::once(self.input)
            .chain(self.hidden.iter().copied())
            .chain(std::iter::once(1))
            .collect();

        widths.windows(2).map(|w| (w[0], w[1])).collect()
    }

    /// Returns the amount of parameters of a network with this shape.
    pub fn size(&self) -> usize {
        self.dims().iter().map(|(i, o)| (i + 1) * o).sum()
    }
}

/// The parameters of one linear layer, as stored in the flat parameter vector.
#[derive(Debug, Clone, Copy)]
pub struct LayerTensors<'a> {
    pub dim: (usize, usize),
    /// Row-major `dim.0 x dim.1`.
    pub weights: &'a [f32],
    pub biases: &'a [f32],
}

/// A fully connected evaluation network with a `Relu` after every layer but the last one.
#[derive(Debug, Clone)]
pub struct Network {
    topology: Topology,
    model: Sequential,
    params: Vec<f32>,
    grad: Vec<f32>,
}

impl Network {
    /// Creates a new `Network` with Kaiming normal weights and zero biases.
    ///
    /// # Arguments
    /// * `topology` - The shape of the network.
    /// * `seed` - Seeds the weight generator, the same seed gives the same parameters.
    pub fn new(topology: Topology, seed: u64) -> Result<Self> {
        let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(seed)));
        let mut param_gens: Vec<Box<dyn ParamGen>> = Vec::new();

        for (fan_in, fan_out) in topology.dims() {
            let weights = RandParamGen::kaiming(Rc::clone(&rng), fan_in * fan_out, fan_in)?;
            param_gens.push(Box::new(weights));
            param_gens.push(Box::new(ConstParamGen::new(0., fan_out)));
        }

        let size = topology.size();
        let params = ChainedParamGen::new(param_gens).sample_exact(size)?;

        Self::from_params(topology, params)
    }

    /// Creates a `Network` out of existing parameters.
    ///
    /// # Returns
    /// An error if `params` doesn't have `topology.size()` values.
    pub fn from_params(topology: Topology, params: Vec<f32>) -> Result<Self> {
        let size = topology.size();

        if params.len() != size {
            return Err(NnueErr::Ml(MlErr::SizeMismatch {
                what: "network parameters",
                got: params.len(),
                expected: size,
            }));
        }

        let dims = topology.dims();
        let last = dims.len() - 1;
        let layers = dims.into_iter().enumerate().map(|(i, dim)| {
            let act_fn = (i != last).then(ActFn::relu);
            Layer::dense(dim, act_fn)
        });

        Ok(Self {
            model: Sequential::new(layers),
            grad: vec![0.; size],
            params,
            topology,
        })
    }

    #[inline]
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    #[inline]
    pub fn params(&self) -> &[f32] {
        &self.params
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.params.len()
    }

    /// Runs the network over a batch of encoded positions.
    ///
    /// # Returns
    /// A `N x 1` matrix of scores.
    pub fn predict(&mut self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let y_pred = self.model.forward(&self.params, x)?;
        Ok(y_pred.to_owned())
    }

    /// Makes a single optimization step over a batch.
    ///
    /// # Arguments
    /// * `x` - The encoded positions.
    /// * `y` - The expected scores, `N x 1`.
    /// * `loss_fn` - The objective.
    /// * `optimizer` - Updates the parameters with the gradient.
    ///
    /// # Returns
    /// The batch loss and the predictions made before the update.
    pub fn train_batch<L, O>(
        &mut self,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
        loss_fn: &L,
        optimizer: &mut O,
    ) -> Result<(f32, Array2<f32>)>
    where
        L: LossFn + ?Sized,
        O: Optimizer + ?Sized,
    {
        let (loss, y_pred) = self.model.train_batch(
            &mut self.params,
            &mut self.grad,
            loss_fn,
            optimizer,
            x,
            y,
        )?;

        Ok((loss, y_pred))
    }

    /// Returns the parameters of each layer, indexed by position.
    pub fn layers(&self) -> Vec<LayerTensors<'_>> {
        let mut rest = self.params.as_slice();

        self.topology
            .dims()
            .into_iter()
            .map(|dim| {
                let (weights, tail) = rest.split_at(dim.0 * dim.1);
                let (biases, tail) = tail.split_at(dim.1);
                rest = tail;

                LayerTensors {
                    dim,
                    weights,
                    biases,
                }
            })
            .collect()
    }
}
