/// Rectified linear unit: zero for negative inputs, identity otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub struct Relu;

impl Relu {
    pub fn new() -> Self {
        Self
    }

    pub fn f(&self, z: f32) -> f32 {
        z.max(0.)
    }

    /// The derivative at `0` is taken as `0`.
    pub fn df(&self, z: f32) -> f32 {
        if z > 0. { 1. } else { 0. }
    }
}
