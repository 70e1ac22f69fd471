use super::{Optimizer, optimizer::check_len};
use crate::{MlErr, Result, specs::OptimizerSpec};

#[derive(Debug)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    beta1_t: f32,
    beta2_t: f32,
    v: Box<[f32]>,
    s: Box<[f32]>,
    epsilon: f32,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `beta1`, `beta2`, `epsilon` - Hyperparameters to the optimization algorithm.
    ///
    /// # Returns
    /// A new `Adam` instance.
    pub fn new(len: usize, learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            beta1_t: 1.,
            beta2_t: 1.,
            v: vec![0.; len].into_boxed_slice(),
            s: vec![0.; len].into_boxed_slice(),
            epsilon,
        }
    }
}

impl Optimizer for Adam {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_len("gradient", grad.len(), params.len())?;
        check_len("parameters", params.len(), self.v.len())?;

        let Self {
            learning_rate: lr,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            ..
        } = *self;

        self.beta1_t *= b1;
        self.beta2_t *= b2;

        let bc1 = 1. - self.beta1_t;
        let bc2 = 1. - self.beta2_t;
        let step_size = lr * (bc2.sqrt() / bc1);

        params
            .iter_mut()
            .zip(grad)
            .zip(self.v.iter_mut())
            .zip(self.s.iter_mut())
            .for_each(|(((p, g), v), s)| {
                *v = b1 * *v + (1. - b1) * g;
                *s = b2 * *s + (1. - b2) * g.powi(2);
                *p -= step_size * *v / (s.sqrt() + eps);
            });

        Ok(())
    }

    fn spec(&self) -> OptimizerSpec {
        OptimizerSpec::Adam {
            learning_rate: self.learning_rate,
            beta1: self.beta1,
            beta2: self.beta2,
            epsilon: self.epsilon,
        }
    }

    fn state(&self) -> Vec<(&'static str, Vec<f32>)> {
        vec![
            ("m", self.v.to_vec()),
            ("v", self.s.to_vec()),
            ("beta1_t", vec![self.beta1_t]),
            ("beta2_t", vec![self.beta2_t]),
        ]
    }

    fn load_state(&mut self, name: &str, values: &[f32]) -> Result<()> {
        match name {
            "m" => {
                check_len("adam first moment", values.len(), self.v.len())?;
                self.v.copy_from_slice(values);
            }
            "v" => {
                check_len("adam second moment", values.len(), self.s.len())?;
                self.s.copy_from_slice(values);
            }
            "beta1_t" => {
                check_len("adam beta1 power", values.len(), 1)?;
                self.beta1_t = values[0];
            }
            "beta2_t" => {
                check_len("adam beta2 power", values.len(), 1)?;
                self.beta2_t = values[0];
            }
            _ => {
                return Err(MlErr::UnknownOptimizerState {
                    optimizer: "adam",
                    name: name.to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_step_moves_by_the_learning_rate() {
        let mut optimizer = Adam::new(2, 0.1, 0.9, 0.999, 1e-8);
        let mut params = [1., 1.];

        optimizer.update_params(&[3., -0.5], &mut params).unwrap();

        assert!((params[0] - 0.9).abs() < 1e-4);
        assert!((params[1] - 1.1).abs() < 1e-4);
    }

    #[test]
    fn resumed_optimizer_matches_the_original() {
        let grads = [[0.2, -0.1], [0.4, 0.3], [-0.5, 0.1]];

        let mut original = Adam::new(2, 0.01, 0.9, 0.999, 1e-8);
        let mut params = [0.5, -0.5];
        original.update_params(&grads[0], &mut params).unwrap();

        let mut resumed = Adam::new(2, 0.01, 0.9, 0.999, 1e-8);
        for (name, values) in original.state() {
            resumed.load_state(name, &values).unwrap();
        }

        let mut resumed_params = params;
        for g in &grads[1..] {
            original.update_params(g, &mut params).unwrap();
            resumed.update_params(g, &mut resumed_params).unwrap();
        }

        assert_eq!(params, resumed_params);
    }

    #[test]
    fn unknown_state_is_rejected() {
        let mut optimizer = Adam::new(1, 0.01, 0.9, 0.999, 1e-8);
        assert!(optimizer.load_state("velocity", &[0.]).is_err());
    }
}
