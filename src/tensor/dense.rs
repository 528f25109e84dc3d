use serde::{Deserialize, Serialize};

use super::range::{Range, TensorIndex};
use crate::permutation::Permutation;
use crate::shape::gemm::GemmHelper;
use crate::types::ShapeScalar;

/// Dense N-dimensional container with row-major storage.
///
/// This is the storage backing the per-tile norm field of a shape; it holds
/// one scalar per tile, not per element.
///
/// # Examples
/// ```
/// use tilesparse::tensor::{dense::Tensor, range::Range};
/// let tensor = Tensor::from_data(Range::new(vec![2, 2]), vec![1.0, 2.0, 3.0, 4.0]);
/// assert_eq!(tensor.get([1, 0]), 3.0);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Tensor<T> {
    range: Range,
    data: Vec<T>,
}

impl<T: Copy> Tensor<T> {
    /// Constructs a tensor with every position set to `value`.
    pub fn new(range: Range, value: T) -> Self {
        let data = vec![value; range.volume()];
        Self { range, data }
    }

    /// Constructs a tensor from flat row-major data.
    ///
    /// # Panics
    /// Panics if `data` does not hold exactly one value per position.
    pub fn from_data(range: Range, data: Vec<T>) -> Self {
        assert_eq!(
            data.len(),
            range.volume(),
            "data length {} does not match range volume {}",
            data.len(),
            range.volume()
        );
        Self { range, data }
    }

    /// Returns the index space of this tensor.
    pub fn range(&self) -> &Range {
        &self.range
    }

    /// Returns true for a default-constructed tensor.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the flat row-major data.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Returns the flat row-major data for modification.
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Returns the value at `index`, given as ordinal or index tuple.
    pub fn get<I: TensorIndex>(&self, index: I) -> T {
        self.data[index.ordinal(&self.range)]
    }

    /// Returns a new tensor with `f` applied to every value.
    pub fn unary(&self, f: impl FnMut(T) -> T) -> Self {
        Self {
            range: self.range.clone(),
            data: self.data.iter().copied().map(f).collect(),
        }
    }

    /// Returns a new tensor with `f` applied to every value and the
    /// dimensions reordered by `perm`.
    pub fn unary_permuted(&self, mut f: impl FnMut(T) -> T, perm: &Permutation) -> Self {
        let result_range = self.range.permute(perm);
        let dest_strides = self.permuted_strides(&result_range, perm);
        // Every slot is written exactly once below; the permutation is a
        // bijection over the positions.
        let mut data = self.data.clone();
        self.range.for_each_index(|ordinal, index| {
            let dest: usize = index.iter().zip(&dest_strides).map(|(&i, &s)| i * s).sum();
            data[dest] = f(self.data[ordinal]);
        });
        Self {
            range: result_range,
            data,
        }
    }

    /// Applies `f` to every value in place.
    pub fn inplace_unary(&mut self, f: impl FnMut(&mut T)) {
        self.data.iter_mut().for_each(f);
    }

    /// Returns a new tensor combining this tensor with `other` element-wise.
    ///
    /// # Panics
    /// Panics unless both tensors share the same index space.
    pub fn binary(&self, other: &Self, mut f: impl FnMut(T, T) -> T) -> Self {
        self.assert_same_range(other);
        Self {
            range: self.range.clone(),
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        }
    }

    /// Element-wise combination followed by a reorder of the dimensions.
    pub fn binary_permuted(
        &self,
        other: &Self,
        mut f: impl FnMut(T, T) -> T,
        perm: &Permutation,
    ) -> Self {
        self.assert_same_range(other);
        let result_range = self.range.permute(perm);
        let dest_strides = self.permuted_strides(&result_range, perm);
        let mut data = self.data.clone();
        self.range.for_each_index(|ordinal, index| {
            let dest: usize = index.iter().zip(&dest_strides).map(|(&i, &s)| i * s).sum();
            data[dest] = f(self.data[ordinal], other.data[ordinal]);
        });
        Self {
            range: result_range,
            data,
        }
    }

    /// Combines `other` into this tensor element-wise, in place.
    pub fn inplace_binary(&mut self, other: &Self, mut f: impl FnMut(&mut T, T)) {
        assert_eq!(
            self.range, other.range,
            "tensor ranges must match for element-wise operations"
        );
        self.data
            .iter_mut()
            .zip(&other.data)
            .for_each(|(a, &b)| f(a, b));
    }

    /// Returns a new tensor with the dimensions reordered by `perm`.
    pub fn permute(&self, perm: &Permutation) -> Self {
        self.unary_permuted(|value| value, perm)
    }

    /// Copies the sub-block `[lo, hi)` into a fresh tensor, applying `f` to
    /// every copied value.
    ///
    /// # Panics
    /// Panics unless `lo[d] < hi[d] <= extent(d)` for every dimension.
    pub fn block_with(&self, lo: &[usize], hi: &[usize], mut f: impl FnMut(T) -> T) -> Self {
        self.assert_block_bounds(lo, hi);
        let result_range = Range::new(lo.iter().zip(hi).map(|(&l, &h)| h - l).collect());
        let mut data = Vec::with_capacity(result_range.volume());
        result_range.for_each_index(|_, index| {
            let src: usize = index
                .iter()
                .zip(lo)
                .enumerate()
                .map(|(d, (&i, &l))| (i + l) * self.range.stride(d))
                .sum();
            data.push(f(self.data[src]));
        });
        Self {
            range: result_range,
            data,
        }
    }

    /// Combines `other` into the sub-block `[lo, hi)` of this tensor.
    ///
    /// # Panics
    /// Panics on invalid bounds or when `other` does not have the extents of
    /// the sub-block.
    pub fn update_block_with(
        &mut self,
        lo: &[usize],
        hi: &[usize],
        other: &Self,
        mut f: impl FnMut(&mut T, T),
    ) {
        self.assert_block_bounds(lo, hi);
        let block_extents: Vec<usize> = lo.iter().zip(hi).map(|(&l, &h)| h - l).collect();
        assert_eq!(
            other.range.extents(),
            &block_extents[..],
            "block operand extents {:?} do not match the sub-block extents {:?}",
            other.range.extents(),
            block_extents
        );
        other.range.for_each_index(|ordinal, index| {
            let dest: usize = index
                .iter()
                .zip(lo)
                .enumerate()
                .map(|(d, (&i, &l))| (i + l) * self.range.stride(d))
                .sum();
            f(&mut self.data[dest], other.data[ordinal]);
        });
    }

    fn assert_same_range(&self, other: &Self) {
        assert_eq!(
            self.range, other.range,
            "tensor ranges must match for element-wise operations"
        );
    }

    fn assert_block_bounds(&self, lo: &[usize], hi: &[usize]) {
        assert!(!self.is_empty(), "block of an empty tensor");
        assert_eq!(lo.len(), self.range.rank(), "lower bound rank mismatch");
        assert_eq!(hi.len(), self.range.rank(), "upper bound rank mismatch");
        for (d, (&l, &h)) in lo.iter().zip(hi).enumerate() {
            assert!(
                l < h && h <= self.range.extent(d),
                "block bounds [{lo:?}, {hi:?}) are invalid for extents {:?}",
                self.range.extents()
            );
        }
    }

    /// Strides of `result_range` as seen from this tensor's iteration order.
    fn permuted_strides(&self, result_range: &Range, perm: &Permutation) -> Vec<usize> {
        assert_eq!(
            perm.rank(),
            self.range.rank(),
            "permutation rank {} does not match tensor rank {}",
            perm.rank(),
            self.range.rank()
        );
        (0..self.range.rank())
            .map(|d| result_range.stride(perm.map(d)))
            .collect()
    }
}

impl<T: ShapeScalar> Tensor<T> {
    /// Generalized matrix multiply: treats this tensor as an `M x K` matrix,
    /// `other` as `K x N`, and returns `factor * self * other` over the
    /// result range described by `helper`. The summation order over `K` is
    /// fixed, so results are deterministic for identical inputs.
    ///
    /// # Panics
    /// Panics on rank or inner-extent mismatches.
    pub fn gemm(&self, other: &Self, factor: T, helper: &GemmHelper) -> Self {
        let (m, n, k) = helper.compute_matrix_sizes(&self.range, &other.range);
        let range = helper.make_result_range(&self.range, &other.range);
        let mut data = vec![T::zero(); range.volume()];
        for i in 0..m {
            let row = &self.data[i * k..(i + 1) * k];
            for j in 0..n {
                let mut acc = T::zero();
                for (kk, &a) in row.iter().enumerate() {
                    acc += a * other.data[kk * n + j];
                }
                data[i * n + j] = factor * acc;
            }
        }
        Self { range, data }
    }
}
