use crate::{MlErr, Result};

/// A finite source of initial parameter values.
///
/// Each generator yields a fixed amount of values, spread over as many calls as needed.
pub trait ParamGen {
    /// Draws up to `n` values.
    ///
    /// # Returns
    /// Fewer than `n` values when the generator runs out, `None` once it's exhausted.
    fn sample(&mut self, n: usize) -> Option<Vec<f32>>;

    /// Draws exactly `n` values.
    ///
    /// # Returns
    /// An `ExhaustedParamGen` error if the generator runs out first.
    fn sample_exact(&mut self, n: usize) -> Result<Vec<f32>> {
        match self.sample(n) {
            Some(values) if values.len() == n => Ok(values),
            values => Err(MlErr::ExhaustedParamGen {
                requested: n,
                got: values.map_or(0, |v| v.len()),
            }),
        }
    }
}
