use crate::{
    arch::loss::{LossFn, Mae, Mse},
    optimization::{Adam, GradientDescent, GradientDescentWithMomentum, Optimizer},
    specs::{LossFnSpec, OptimizerSpec},
};

/// Builds the trait objects described by the serializable specs.
#[derive(Default)]
pub struct Builder;

impl Builder {
    /// Creates a new `Builder`.
    pub fn new() -> Self {
        Self
    }

    /// Builds a fresh optimizer following a spec.
    ///
    /// # Arguments
    /// * `spec` - The specification for the optimizer.
    /// * `len` - The amount of parameters the optimizer will update.
    pub fn optimizer(&self, spec: OptimizerSpec, len: usize) -> Box<dyn Optimizer> {
        match spec {
            OptimizerSpec::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
            } => Box::new(Adam::new(len, learning_rate, beta1, beta2, epsilon)),
            OptimizerSpec::GradientDescent { learning_rate } => {
                Box::new(GradientDescent::new(learning_rate))
            }
            OptimizerSpec::GradientDescentWithMomentum {
                learning_rate,
                momentum,
            } => Box::new(GradientDescentWithMomentum::new(len, learning_rate, momentum)),
        }
    }

    /// Builds the loss function following a spec.
    pub fn loss_fn(&self, spec: LossFnSpec) -> Box<dyn LossFn> {
        match spec {
            LossFnSpec::Mse => Box::new(Mse::new()),
            LossFnSpec::Mae => Box::new(Mae::new()),
        }
    }
}
