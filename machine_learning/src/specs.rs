use serde::{Deserialize, Serialize};

/// The specification for the `Optimizer` trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerSpec {
    Adam {
        learning_rate: f32,
        beta1: f32,
        beta2: f32,
        epsilon: f32,
    },
    GradientDescent {
        learning_rate: f32,
    },
    GradientDescentWithMomentum {
        learning_rate: f32,
        momentum: f32,
    },
}

impl OptimizerSpec {
    /// An `Adam` specification with the usual `beta1`, `beta2` and `epsilon` values.
    pub fn adam(learning_rate: f32) -> Self {
        Self::Adam {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }

    /// Returns the identifier of the optimizer kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Adam { .. } => "adam",
            Self::GradientDescent { .. } => "gradient_descent",
            Self::GradientDescentWithMomentum { .. } => "gradient_descent_with_momentum",
        }
    }

    pub fn learning_rate(&self) -> f32 {
        match *self {
            Self::Adam { learning_rate, .. }
            | Self::GradientDescent { learning_rate }
            | Self::GradientDescentWithMomentum { learning_rate, .. } => learning_rate,
        }
    }
}

/// The specification for the `LossFn` trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossFnSpec {
    #[default]
    Mse,
    Mae,
}

impl LossFnSpec {
    /// Returns the identifier of the loss function.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mse => "mse",
            Self::Mae => "mae",
        }
    }
}
