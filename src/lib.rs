//! Block-sparse shape core for distributed tiled tensor algebra.
//!
//! A [`shape::SparseShape`] tracks the normalized Frobenius norm of every
//! tile of a tiled tensor and combines those estimates under the tensor
//! algebra (scale, permute, add, Hadamard product, contraction, sub-block
//! selection), so that tile-level kernels can skip tiles whose contribution
//! is provably negligible.

#[cfg(feature = "mpi")]
pub mod mpi;

pub mod permutation;
pub mod random;
pub mod shape;
pub mod tensor;
pub mod tiledrange;
pub mod types;
