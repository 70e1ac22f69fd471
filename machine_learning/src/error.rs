use std::{
    error::Error,
    fmt::{self, Display},
};

use ndarray::ShapeError;
use rand_distr::NormalError;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    Shape(ShapeError),
    UnknownOptimizerState {
        optimizer: &'static str,
        name: String,
    },
    InvalidDistribution(String),
    ExhaustedParamGen {
        requested: usize,
        got: usize,
    },
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch for {what}, got {got} and expected {expected}"
            ),
            MlErr::Shape(e) => write!(f, "Invalid array shape: {e}"),
            MlErr::UnknownOptimizerState { optimizer, name } => write!(
                f,
                "The {optimizer} optimizer has no state buffer named `{name}`"
            ),
            MlErr::InvalidDistribution(msg) => {
                write!(f, "Failed to build the parameter distribution: {msg}")
            }
            MlErr::ExhaustedParamGen { requested, got } => write!(
                f,
                "The parameter generator ran out after {got} of {requested} values"
            ),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Shape(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for MlErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}

impl From<NormalError> for MlErr {
    fn from(value: NormalError) -> Self {
        Self::InvalidDistribution(value.to_string())
    }
}
