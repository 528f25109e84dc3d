pub mod dense;
pub mod range;

pub use dense::Tensor;
pub use range::{Range, TensorIndex};
