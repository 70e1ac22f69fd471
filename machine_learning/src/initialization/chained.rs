use super::ParamGen;

/// Draws from a sequence of parameter generators, moving to the next one once the current one
/// is exhausted.
///
/// A network is usually initialized with one chain link per tensor: a random generator for the
/// weights of each layer followed by a constant one for its biases.
pub struct ChainedParamGen {
    param_gens: Vec<Box<dyn ParamGen>>,
    curr: usize,
}

impl ChainedParamGen {
    /// Creates a new `ChainedParamGen` parameter generator.
    ///
    /// # Arguments
    /// * `param_gens` - The generators, in the order their values should come out.
    pub fn new(param_gens: Vec<Box<dyn ParamGen>>) -> Self {
        Self {
            param_gens,
            curr: 0,
        }
    }
}

impl ParamGen for ChainedParamGen {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        let mut out = Vec::with_capacity(n);

        while out.len() < n {
            let Some(param_gen) = self.param_gens.get_mut(self.curr) else {
                break;
            };

            match param_gen.sample(n - out.len()) {
                Some(values) if !values.is_empty() => out.extend(values),
                _ => self.curr += 1,
            }
        }

        (!out.is_empty() || n == 0).then_some(out)
    }
}
