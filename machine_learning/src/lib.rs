pub mod arch;
pub mod builder;
pub mod error;
pub mod initialization;
pub mod optimization;
pub mod specs;

pub use error::{MlErr, Result};
