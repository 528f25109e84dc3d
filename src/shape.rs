pub mod gemm;
pub mod sparse;

pub use gemm::GemmHelper;
pub use sparse::SparseShape;
