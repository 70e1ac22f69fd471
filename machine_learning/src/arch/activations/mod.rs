mod act_fn;
mod relu;

pub use act_fn::ActFn;
pub use relu::Relu;
