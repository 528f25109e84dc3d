use std::fmt;
use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};

use super::gemm::GemmHelper;
use crate::permutation::Permutation;
use crate::tensor::range::{Range, TensorIndex};
use crate::tensor::Tensor;
use crate::tiledrange::TiledRange;
use crate::types::ShapeScalar;

/// Per-dimension tile extents, shared between shapes that derive from one
/// another without reordering or slicing the dimension list.
type SizeVectors<T> = Arc<[Box<[T]>]>;

/// Block-sparse shape of a tiled tensor.
///
/// The shape estimates the magnitude of every tile of a tensor with a dense
/// field of Frobenius norms over the tile index space. Because tiles may
/// have arbitrary sizes, the stored norms are normalized by dividing each
/// norm by the number of elements in its tile:
///
/// ```text
/// shape[i, j, ...] = ||A[i, j, ...]|| / (N_i * N_j * ...)
/// ```
///
/// Normalized norms strictly below the zero threshold (see
/// [`ShapeScalar::threshold`]) are stored as exact zeros; the corresponding
/// tiles are screened out of tile-level work. Normalization happens exactly
/// once, at construction. All algebraic operations combine normalized norms
/// directly, except contraction, which reintroduces the contracted tile
/// volumes on its inputs and renormalizes its output by the result tile
/// volumes.
///
/// Shapes are immutable values; every operation returns a fresh shape.
///
/// # Examples
/// ```
/// use tilesparse::shape::sparse::SparseShape;
/// use tilesparse::tensor::{Range, Tensor};
/// use tilesparse::tiledrange::TiledRange;
///
/// let trange = TiledRange::from_extents([[2, 3, 5]]);
/// let norms = Tensor::from_data(Range::new(vec![3]), vec![4.0, 3.0, 0.0]);
/// let shape = SparseShape::new(norms, &trange);
/// assert_eq!(shape.norm([0]), 2.0);
/// assert!(shape.is_zero([2]));
/// assert_eq!(shape.sparsity(), 1.0 / 3.0);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SparseShape<T> {
    tile_norms: Tensor<T>,
    size_vectors: SizeVectors<T>,
    zero_tile_count: usize,
}

/// Applies `op` to every entry, zeroing results below the threshold.
/// Returns the number of entries zeroed.
fn map_threshold<T: ShapeScalar>(data: &mut [T], op: impl Fn(T) -> T + Sync) -> usize {
    let threshold = T::threshold();
    let zeroed = AtomicUsize::new(0);
    data.par_iter_mut().for_each(|norm| {
        let value = op(*norm);
        *norm = if value < threshold {
            zeroed.fetch_add(1, Ordering::Relaxed);
            T::zero()
        } else {
            value
        };
    });
    zeroed.into_inner()
}

/// Combines two equal-length slices entry-wise into a fresh buffer, zeroing
/// results below the threshold. Returns the buffer and the zeroed count.
fn zip_threshold<T: ShapeScalar>(
    left: &[T],
    right: &[T],
    op: impl Fn(T, T) -> T + Sync,
) -> (Vec<T>, usize) {
    let threshold = T::threshold();
    let zeroed = AtomicUsize::new(0);
    let data = left
        .par_iter()
        .zip(right.par_iter())
        .map(|(&a, &b)| {
            let value = op(a, b);
            if value < threshold {
                zeroed.fetch_add(1, Ordering::Relaxed);
                T::zero()
            } else {
                value
            }
        })
        .collect();
    (data, zeroed.into_inner())
}

/// In-place variant of [`zip_threshold`] with the right operand read-only.
fn zip_threshold_inplace<T: ShapeScalar>(
    data: &mut [T],
    rhs: &[T],
    op: impl Fn(T, T) -> T + Sync,
) -> usize {
    let threshold = T::threshold();
    let zeroed = AtomicUsize::new(0);
    data.par_iter_mut().zip(rhs.par_iter()).for_each(|(norm, &r)| {
        let value = op(*norm, r);
        *norm = if value < threshold {
            zeroed.fetch_add(1, Ordering::Relaxed);
            T::zero()
        } else {
            value
        };
    });
    zeroed.into_inner()
}

/// Applies `op(norm, left_i * right_j)` over the row-major
/// `left.len() x right.len()` field in `data`, zeroing results below the
/// threshold. Returns the zeroed count.
///
/// This is the rank-2 pass shared by the normalization, volume-rescale and
/// constant-add kernels: each builds the two halves of a rank-N outer
/// product (of size sqrt(volume) each on balanced shapes) and lets this pass
/// combine them, instead of materializing the full rank-N product.
fn outer_threshold<T: ShapeScalar>(
    left: &[T],
    right: &[T],
    data: &mut [T],
    op: impl Fn(T, T) -> T + Sync,
) -> usize {
    debug_assert_eq!(data.len(), left.len() * right.len());
    let threshold = T::threshold();
    let zeroed = AtomicUsize::new(0);
    data.par_chunks_mut(right.len())
        .zip(left.par_iter())
        .for_each(|(row, &x)| {
            let mut count = 0;
            for (norm, &y) in row.iter_mut().zip(right) {
                let value = op(*norm, x * y);
                *norm = if value < threshold {
                    count += 1;
                    T::zero()
                } else {
                    value
                };
            }
            zeroed.fetch_add(count, Ordering::Relaxed);
        });
    zeroed.into_inner()
}

/// Combines per-dimension size vectors into a single weight vector: `op`
/// transforms each size vector, the halves are combined by element-wise
/// outer multiplication. The split at the middle keeps the temporaries of
/// the two recursion branches balanced; associativity makes the split point
/// immaterial to the values. The output length is the product of the input
/// lengths.
fn recursive_outer_product<T, F>(size_vectors: &[Box<[T]>], op: &F) -> Box<[T]>
where
    T: ShapeScalar,
    F: Fn(&[T]) -> Box<[T]>,
{
    if size_vectors.len() == 1 {
        return op(&size_vectors[0]);
    }
    let middle = size_vectors.len().div_ceil(2);
    let left = recursive_outer_product(&size_vectors[..middle], op);
    let right = recursive_outer_product(&size_vectors[middle..], op);
    let mut result = Vec::with_capacity(left.len() * right.len());
    for &x in &*left {
        for &y in &*right {
            result.push(x * y);
        }
    }
    result.into_boxed_slice()
}

/// Extracts the per-dimension tile extents of `trange` as norm scalars.
fn initialize_size_vectors<T: ShapeScalar>(trange: &TiledRange) -> SizeVectors<T> {
    trange
        .dims()
        .map(|dim| dim.tile_extents().map(T::from_extent).collect())
        .collect()
}

/// Divides each norm by the element count of its tile, zeroing normalized
/// norms below the threshold. Returns the zeroed count.
///
/// # Panics
/// Panics if any raw norm is negative.
fn normalize<T: ShapeScalar>(tile_norms: &mut Tensor<T>, size_vectors: &[Box<[T]>]) -> usize {
    if tile_norms.range().rank() == 1 {
        zip_threshold_inplace(tile_norms.data_mut(), &size_vectors[0], |norm, size| {
            assert!(norm >= T::zero(), "tile norms must be non-negative");
            norm / size
        })
    } else {
        let reciprocal = |sizes: &[T]| -> Box<[T]> { sizes.iter().map(|&s| s.recip()).collect() };
        let middle = size_vectors.len().div_ceil(2);
        let left = recursive_outer_product(&size_vectors[..middle], &reciprocal);
        let right = recursive_outer_product(&size_vectors[middle..], &reciprocal);
        outer_threshold(&left, &right, tile_norms.data_mut(), |norm, factor| {
            assert!(norm >= T::zero(), "tile norms must be non-negative");
            norm * factor
        })
    }
}

/// Multiplies each norm by the element count of its tile. Used by the
/// Hadamard product, whose operands each carry one inverse volume factor too
/// many for the result. Returns the zeroed count.
fn scale_by_size<T: ShapeScalar>(tile_norms: &mut Tensor<T>, size_vectors: &[Box<[T]>]) -> usize {
    if tile_norms.range().rank() == 1 {
        zip_threshold_inplace(tile_norms.data_mut(), &size_vectors[0], |norm, size| norm * size)
    } else {
        let identity = |sizes: &[T]| -> Box<[T]> { Box::from(sizes) };
        let middle = size_vectors.len().div_ceil(2);
        let left = recursive_outer_product(&size_vectors[..middle], &identity);
        let right = recursive_outer_product(&size_vectors[middle..], &identity);
        outer_threshold(&left, &right, tile_norms.data_mut(), |norm, factor| norm * factor)
    }
}

impl<T: ShapeScalar> SparseShape<T> {
    /// Constructs a shape from raw (un-normalized) tile norms.
    ///
    /// Each norm is divided by the element count of its tile; normalized
    /// norms strictly below the threshold become exact zeros.
    ///
    /// # Panics
    /// Panics if `tile_norms` is empty, its range does not match the tile
    /// space of `trange`, or any norm is negative.
    pub fn new(tile_norms: Tensor<T>, trange: &TiledRange) -> Self {
        assert!(!tile_norms.is_empty(), "tile norms must not be empty");
        assert_eq!(
            tile_norms.range(),
            &trange.tiles_range(),
            "tile norms do not match the tile space of the tiled range"
        );
        let size_vectors = initialize_size_vectors(trange);
        let mut tile_norms = tile_norms;
        let zero_tile_count = normalize(&mut tile_norms, &size_vectors);
        Self {
            tile_norms,
            size_vectors,
            zero_tile_count,
        }
    }

    /// Internal constructor from already-normalized norms. Every algebraic
    /// operation funnels through here; none of them re-normalize.
    fn from_normalized(
        tile_norms: Tensor<T>,
        size_vectors: SizeVectors<T>,
        zero_tile_count: usize,
    ) -> Self {
        Self {
            tile_norms,
            size_vectors,
            zero_tile_count,
        }
    }

    /// Returns the current zero threshold for this shape's scalar type.
    pub fn threshold() -> T {
        T::threshold()
    }

    /// Sets the process-wide zero threshold for this shape's scalar type.
    /// Existing shapes are not rescreened.
    pub fn set_threshold(value: T) {
        T::set_threshold(value);
    }

    /// Returns false: this shape screens tiles.
    pub const fn is_dense() -> bool {
        false
    }

    /// Returns true for a default-constructed shape that holds no data.
    pub fn is_empty(&self) -> bool {
        self.tile_norms.is_empty()
    }

    /// Returns true when this shape is initialized and `range` matches its
    /// tile index space.
    pub fn validate(&self, range: &Range) -> bool {
        !self.is_empty() && range == self.tile_norms.range()
    }

    /// Returns true when the tile at `index` is screened out.
    pub fn is_zero<I: TensorIndex>(&self, index: I) -> bool {
        self.assert_initialized();
        self.tile_norms.get(index) < T::threshold()
    }

    /// Returns the normalized norm of the tile at `index`.
    pub fn norm<I: TensorIndex>(&self, index: I) -> T {
        self.assert_initialized();
        self.tile_norms.get(index)
    }

    /// Returns the fraction of tiles that are zero.
    pub fn sparsity(&self) -> f64 {
        self.assert_initialized();
        self.zero_tile_count as f64 / self.tile_norms.range().volume() as f64
    }

    /// Returns the number of zero tiles.
    pub fn zero_tile_count(&self) -> usize {
        self.zero_tile_count
    }

    /// Returns the normalized norm field.
    pub fn data(&self) -> &Tensor<T> {
        &self.tile_norms
    }

    /// Returns the tile extents along dimension `d`.
    pub fn size_vector(&self, d: usize) -> &[T] {
        &self.size_vectors[d]
    }

    fn assert_initialized(&self) {
        assert!(!self.tile_norms.is_empty(), "operation on an uninitialized shape");
    }

    fn assert_same_shape(&self, other: &Self) {
        self.assert_initialized();
        other.assert_initialized();
        assert_eq!(
            self.tile_norms.range(),
            other.tile_norms.range(),
            "shape tile ranges must match"
        );
    }

    /// Size vectors with the dimension order rearranged by `perm`.
    fn perm_size_vectors(&self, perm: &Permutation) -> SizeVectors<T> {
        perm.permute(&self.size_vectors).into()
    }

    /// Size vectors sliced to the tile sub-block `[lo, hi)`.
    fn block_size_vectors(&self, lo: &[usize], hi: &[usize]) -> SizeVectors<T> {
        self.size_vectors
            .iter()
            .enumerate()
            .map(|(d, sizes)| Box::from(&sizes[lo[d]..hi[d]]))
            .collect()
    }

    /// Returns this shape scaled by `|factor|`.
    ///
    /// # Examples
    /// ```
    /// use tilesparse::shape::sparse::SparseShape;
    /// use tilesparse::tensor::{Range, Tensor};
    /// use tilesparse::tiledrange::TiledRange;
    ///
    /// let trange = TiledRange::from_extents([[2, 3, 5]]);
    /// let norms = Tensor::from_data(Range::new(vec![3]), vec![4.0, 3.0, 0.0]);
    /// let shape = SparseShape::new(norms, &trange);
    /// let halved = shape.scale(-0.5);
    /// assert_eq!(halved.norm([0]), 1.0);
    /// assert_eq!(halved.zero_tile_count(), 1);
    /// ```
    pub fn scale(&self, factor: T) -> Self {
        self.assert_initialized();
        let abs_factor = factor.abs();
        let mut result = self.tile_norms.clone();
        let zero_tile_count = map_threshold(result.data_mut(), |norm| norm * abs_factor);
        Self::from_normalized(result, Arc::clone(&self.size_vectors), zero_tile_count)
    }

    /// Returns this shape scaled by `|factor|` with its dimensions reordered
    /// by `perm`.
    pub fn scale_permuted(&self, factor: T, perm: &Permutation) -> Self {
        self.assert_initialized();
        let abs_factor = factor.abs();
        let threshold = T::threshold();
        let zeroed = AtomicUsize::new(0);
        let result = self.tile_norms.unary_permuted(
            |norm| {
                let value = norm * abs_factor;
                if value < threshold {
                    zeroed.fetch_add(1, Ordering::Relaxed);
                    T::zero()
                } else {
                    value
                }
            },
            perm,
        );
        Self::from_normalized(result, self.perm_size_vectors(perm), zeroed.into_inner())
    }

    /// Returns this shape with its dimensions reordered by `perm`. The zero
    /// tile count is unchanged.
    pub fn permute(&self, perm: &Permutation) -> Self {
        self.assert_initialized();
        Self::from_normalized(
            self.tile_norms.permute(perm),
            self.perm_size_vectors(perm),
            self.zero_tile_count,
        )
    }

    /// Applies a caller-supplied transformation to the norm field and
    /// rethresholds the result.
    ///
    /// The input norms are already normalized and `op` must not normalize
    /// again; with the identity operation the result equals this shape. This
    /// is the extension point for custom screening estimators.
    ///
    /// # Panics
    /// Panics if `op` changes the tile range or produces a negative norm.
    pub fn transform(&self, op: impl FnOnce(&Tensor<T>) -> Tensor<T>) -> Self {
        self.assert_initialized();
        let mut new_norms = op(&self.tile_norms);
        assert_eq!(
            new_norms.range(),
            self.tile_norms.range(),
            "transformed norms must keep the tile range"
        );
        let zero_tile_count = map_threshold(new_norms.data_mut(), |norm| {
            assert!(norm >= T::zero(), "tile norms must be non-negative");
            norm
        });
        Self::from_normalized(new_norms, Arc::clone(&self.size_vectors), zero_tile_count)
    }

    /// Adds a uniform element-wise offset of magnitude `|value|` to the
    /// estimate: each normalized norm gains `|value| / sqrt(tile volume)`,
    /// the increment equivalent to adding `|value|` to every element of the
    /// tile.
    pub fn add_const(&self, value: T) -> Self {
        self.assert_initialized();
        let value = value.abs();
        let mut result = self.tile_norms.clone();
        let zero_tile_count = if self.tile_norms.range().rank() == 1 {
            zip_threshold_inplace(result.data_mut(), &self.size_vectors[0], |norm, size| {
                norm + value / size.sqrt()
            })
        } else {
            let inv_sqrt =
                |sizes: &[T]| -> Box<[T]> { sizes.iter().map(|&s| s.sqrt().recip()).collect() };
            let middle = self.size_vectors.len().div_ceil(2);
            let left = recursive_outer_product(&self.size_vectors[..middle], &inv_sqrt);
            // Fold the offset into the left half once instead of per tile.
            let left: Box<[T]> = left.iter().map(|&x| x * value).collect();
            let right = recursive_outer_product(&self.size_vectors[middle..], &inv_sqrt);
            outer_threshold(&left, &right, result.data_mut(), |norm, factor| norm + factor)
        };
        Self::from_normalized(result, Arc::clone(&self.size_vectors), zero_tile_count)
    }

    /// [`SparseShape::add_const`] followed by a permutation of the result.
    pub fn add_const_permuted(&self, value: T, perm: &Permutation) -> Self {
        self.add_const(value).permute(perm)
    }

    fn binary_threshold(&self, other: &Self, op: impl Fn(T, T) -> T + Sync) -> Self {
        self.assert_same_shape(other);
        let (data, zero_tile_count) =
            zip_threshold(self.tile_norms.data(), other.tile_norms.data(), op);
        Self::from_normalized(
            Tensor::from_data(self.tile_norms.range().clone(), data),
            Arc::clone(&self.size_vectors),
            zero_tile_count,
        )
    }

    fn binary_threshold_permuted(
        &self,
        other: &Self,
        op: impl Fn(T, T) -> T,
        perm: &Permutation,
    ) -> Self {
        self.assert_same_shape(other);
        let threshold = T::threshold();
        let zeroed = AtomicUsize::new(0);
        let result = self.tile_norms.binary_permuted(
            &other.tile_norms,
            |a, b| {
                let value = op(a, b);
                if value < threshold {
                    zeroed.fetch_add(1, Ordering::Relaxed);
                    T::zero()
                } else {
                    value
                }
            },
            perm,
        );
        Self::from_normalized(result, self.perm_size_vectors(perm), zeroed.into_inner())
    }

    /// Returns the element-wise sum of two shapes, the triangle-inequality
    /// upper bound on the norms of the summed tensor.
    pub fn add(&self, other: &Self) -> Self {
        self.binary_threshold(other, |a, b| a + b)
    }

    /// Returns `|factor| * (self + other)`.
    pub fn add_scaled(&self, other: &Self, factor: T) -> Self {
        let abs_factor = factor.abs();
        self.binary_threshold(other, move |a, b| (a + b) * abs_factor)
    }

    /// Returns `self + other` with the result dimensions reordered by `perm`.
    pub fn add_permuted(&self, other: &Self, perm: &Permutation) -> Self {
        self.binary_threshold_permuted(other, |a, b| a + b, perm)
    }

    /// Returns `|factor| * (self + other)`, permuted by `perm`.
    pub fn add_scaled_permuted(&self, other: &Self, factor: T, perm: &Permutation) -> Self {
        let abs_factor = factor.abs();
        self.binary_threshold_permuted(other, move |a, b| (a + b) * abs_factor, perm)
    }

    /// Returns the magnitude bound of a tile-wise subtraction. Subtraction
    /// cannot cancel magnitudes, so this equals [`SparseShape::add`].
    pub fn subt(&self, other: &Self) -> Self {
        self.add(other)
    }

    /// See [`SparseShape::subt`].
    pub fn subt_scaled(&self, other: &Self, factor: T) -> Self {
        self.add_scaled(other, factor)
    }

    /// See [`SparseShape::subt`].
    pub fn subt_permuted(&self, other: &Self, perm: &Permutation) -> Self {
        self.add_permuted(other, perm)
    }

    /// See [`SparseShape::subt`].
    pub fn subt_scaled_permuted(&self, other: &Self, factor: T, perm: &Permutation) -> Self {
        self.add_scaled_permuted(other, factor, perm)
    }

    /// See [`SparseShape::add_const`].
    pub fn subt_const(&self, value: T) -> Self {
        self.add_const(value)
    }

    /// See [`SparseShape::add_const`].
    pub fn subt_const_permuted(&self, value: T, perm: &Permutation) -> Self {
        self.add_const_permuted(value, perm)
    }

    /// Returns the shape of a tile-wise (Hadamard) product.
    ///
    /// The norm of a product tile is bounded by the product of the operand
    /// tile norms. Multiplying two normalized norms divides by the tile
    /// volume twice, so the product is rescaled by the tile volumes once to
    /// restore the normalization of the result.
    pub fn mult(&self, other: &Self) -> Self {
        self.assert_same_shape(other);
        let mut result = self.tile_norms.binary(&other.tile_norms, |a, b| a * b);
        let zero_tile_count = scale_by_size(&mut result, &self.size_vectors);
        Self::from_normalized(result, Arc::clone(&self.size_vectors), zero_tile_count)
    }

    /// Returns `|factor| * (self ⊙ other)` rescaled like [`SparseShape::mult`].
    pub fn mult_scaled(&self, other: &Self, factor: T) -> Self {
        self.assert_same_shape(other);
        let abs_factor = factor.abs();
        let mut result = self
            .tile_norms
            .binary(&other.tile_norms, |a, b| a * b * abs_factor);
        let zero_tile_count = scale_by_size(&mut result, &self.size_vectors);
        Self::from_normalized(result, Arc::clone(&self.size_vectors), zero_tile_count)
    }

    /// Permuted variant of [`SparseShape::mult`].
    pub fn mult_permuted(&self, other: &Self, perm: &Permutation) -> Self {
        self.assert_same_shape(other);
        let mut result = self
            .tile_norms
            .binary_permuted(&other.tile_norms, |a, b| a * b, perm);
        let size_vectors = self.perm_size_vectors(perm);
        let zero_tile_count = scale_by_size(&mut result, &size_vectors);
        Self::from_normalized(result, size_vectors, zero_tile_count)
    }

    /// Permuted variant of [`SparseShape::mult_scaled`].
    pub fn mult_scaled_permuted(&self, other: &Self, factor: T, perm: &Permutation) -> Self {
        self.assert_same_shape(other);
        let abs_factor = factor.abs();
        let mut result =
            self.tile_norms
                .binary_permuted(&other.tile_norms, |a, b| a * b * abs_factor, perm);
        let size_vectors = self.perm_size_vectors(perm);
        let zero_tile_count = scale_by_size(&mut result, &size_vectors);
        Self::from_normalized(result, size_vectors, zero_tile_count)
    }

    /// Intersects this shape with a hard-zero pattern: a tile survives only
    /// where both this shape and `mask_shape` are above the threshold.
    pub fn mask(&self, mask_shape: &Self) -> Self {
        self.assert_same_shape(mask_shape);
        let threshold = T::threshold();
        let zeroed = AtomicUsize::new(self.zero_tile_count);
        let data = self
            .tile_norms
            .data()
            .par_iter()
            .zip(mask_shape.tile_norms.data().par_iter())
            .map(|(&norm, &mask)| {
                if norm >= threshold && mask < threshold {
                    zeroed.fetch_add(1, Ordering::Relaxed);
                    T::zero()
                } else {
                    norm
                }
            })
            .collect();
        Self::from_normalized(
            Tensor::from_data(self.tile_norms.range().clone(), data),
            Arc::clone(&self.size_vectors),
            zeroed.into_inner(),
        )
    }

    /// Replaces the tile sub-block `[lo, hi)` with the norms of `other`.
    ///
    /// The replacement is copy-on-write; the zero tile count is maintained
    /// by observing each cell's transition across the threshold.
    ///
    /// # Panics
    /// Panics on invalid bounds or when `other` does not have the extents of
    /// the sub-block.
    pub fn update_block(&self, lo: &[usize], hi: &[usize], other: &Self) -> Self {
        self.assert_initialized();
        other.assert_initialized();
        let threshold = T::threshold();
        let zeroed = AtomicIsize::new(self.zero_tile_count as isize);
        let mut result = self.tile_norms.clone();
        result.update_block_with(lo, hi, &other.tile_norms, |old, new| {
            if *old >= threshold && new < threshold {
                zeroed.fetch_add(1, Ordering::Relaxed);
            } else if *old < threshold && new >= threshold {
                zeroed.fetch_add(-1, Ordering::Relaxed);
            }
            *old = new;
        });
        Self::from_normalized(
            result,
            Arc::clone(&self.size_vectors),
            zeroed.into_inner() as usize,
        )
    }

    /// Extracts the tile sub-block `[lo, hi)` as a fresh shape. Zero tiles
    /// are recounted on the sub-block, and the size vectors are sliced
    /// accordingly.
    ///
    /// # Panics
    /// Panics unless `lo[d] < hi[d] <= extent(d)` for every dimension.
    ///
    /// # Examples
    /// ```
    /// use tilesparse::shape::sparse::SparseShape;
    /// use tilesparse::tensor::{Range, Tensor};
    /// use tilesparse::tiledrange::TiledRange;
    ///
    /// let trange = TiledRange::from_extents([[2, 3, 5]]);
    /// let norms = Tensor::from_data(Range::new(vec![3]), vec![4.0, 3.0, 0.0]);
    /// let shape = SparseShape::new(norms, &trange);
    /// let tail = shape.block(&[1], &[3]);
    /// assert_eq!(tail.data().data(), &[1.0, 0.0]);
    /// assert_eq!(tail.zero_tile_count(), 1);
    /// assert_eq!(tail.size_vector(0), &[3.0, 5.0]);
    /// ```
    pub fn block(&self, lo: &[usize], hi: &[usize]) -> Self {
        self.assert_initialized();
        let threshold = T::threshold();
        let zeroed = AtomicUsize::new(0);
        let norms = self.tile_norms.block_with(lo, hi, |value| {
            if value < threshold {
                zeroed.fetch_add(1, Ordering::Relaxed);
            }
            value
        });
        Self::from_normalized(norms, self.block_size_vectors(lo, hi), zeroed.into_inner())
    }

    /// Extracts the tile sub-block `[lo, hi)` scaled by `|factor|`, fusing
    /// the scale and the threshold into the copy pass.
    pub fn block_scaled(&self, lo: &[usize], hi: &[usize], factor: T) -> Self {
        self.assert_initialized();
        let abs_factor = factor.abs();
        let threshold = T::threshold();
        let zeroed = AtomicUsize::new(0);
        let norms = self.tile_norms.block_with(lo, hi, |value| {
            let value = value * abs_factor;
            if value < threshold {
                zeroed.fetch_add(1, Ordering::Relaxed);
                T::zero()
            } else {
                value
            }
        });
        Self::from_normalized(norms, self.block_size_vectors(lo, hi), zeroed.into_inner())
    }

    /// [`SparseShape::block`] followed by a permutation of the result.
    pub fn block_permuted(&self, lo: &[usize], hi: &[usize], perm: &Permutation) -> Self {
        self.block(lo, hi).permute(perm)
    }

    /// [`SparseShape::block_scaled`] followed by a permutation of the result.
    pub fn block_scaled_permuted(
        &self,
        lo: &[usize],
        hi: &[usize],
        factor: T,
        perm: &Permutation,
    ) -> Self {
        self.block_scaled(lo, hi, factor).permute(perm)
    }

    /// Returns the shape of a pairwise contraction described by `helper`,
    /// scaled by `|factor|`.
    ///
    /// For `C_ik = sum_j A_ij * B_jk` the norm of a result tile is bounded
    /// by `sum_j ||A_ij|| * ||B_jk||`. The stored norms carry an inverse
    /// tile volume each, so the contracted tile volumes are reintroduced
    /// once on each operand before the fused matrix multiply; the result
    /// then comes out normalized by the result tile volumes. With no
    /// contracted dimension the result is the direct outer product
    /// `|factor| * L ⊗ R`.
    pub fn gemm(&self, other: &Self, factor: T, helper: &GemmHelper) -> Self {
        self.assert_initialized();
        other.assert_initialized();
        let abs_factor = factor.abs();

        // Left outer size vectors, then right outer size vectors.
        let result_size_vectors: SizeVectors<T> = self.size_vectors[helper.left_outer()]
            .iter()
            .cloned()
            .chain(other.size_vectors[helper.right_outer()].iter().cloned())
            .collect();

        if helper.inner_rank() > 0 {
            let identity = |sizes: &[T]| -> Box<[T]> { Box::from(sizes) };
            let k_sizes =
                recursive_outer_product(&self.size_vectors[helper.left_inner()], &identity);
            let (_m, n, k) = helper
                .compute_matrix_sizes(self.tile_norms.range(), other.tile_norms.range());
            debug_assert_eq!(k, k_sizes.len());

            // Undo one inverse volume factor along the contracted axes of
            // each operand, so the matrix multiply sums raw magnitudes.
            let mut left = self.tile_norms.clone();
            for row in left.data_mut().chunks_mut(k) {
                for (value, &size) in row.iter_mut().zip(&*k_sizes) {
                    *value *= size;
                }
            }
            let mut right = other.tile_norms.clone();
            for (row, &size) in right.data_mut().chunks_mut(n).zip(&*k_sizes) {
                for value in row {
                    *value *= size;
                }
            }

            let mut result = left.gemm(&right, abs_factor, helper);
            let zero_tile_count = map_threshold(result.data_mut(), |norm| norm);
            Self::from_normalized(result, result_size_vectors, zero_tile_count)
        } else {
            // Pure outer product; both operands stay normalized as they are.
            let range = helper.make_result_range(self.tile_norms.range(), other.tile_norms.range());
            let mut result = Tensor::new(range, T::zero());
            let zero_tile_count = outer_threshold(
                self.tile_norms.data(),
                other.tile_norms.data(),
                result.data_mut(),
                |_, product| product * abs_factor,
            );
            Self::from_normalized(result, result_size_vectors, zero_tile_count)
        }
    }

    /// [`SparseShape::gemm`] followed by a permutation of the result.
    pub fn gemm_permuted(
        &self,
        other: &Self,
        factor: T,
        helper: &GemmHelper,
        perm: &Permutation,
    ) -> Self {
        self.gemm(other, factor, helper).permute(perm)
    }
}

impl<T: ShapeScalar> fmt::Display for SparseShape<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SparseShape<{}>:", T::NAME)?;
        write!(f, "{:?}", self.tile_norms.data())
    }
}

const NAME: &str = "SparseShape";
const FIELDS: &[&str] = &["tile_norms", "size_vectors"];

/// Shapes travel as the norm field plus the size vectors; the zero tile
/// count is never transported and is recomputed against the receiver's
/// threshold.
impl<T: ShapeScalar> Serialize for SparseShape<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct(NAME, FIELDS.len())?;
        state.serialize_field(FIELDS[0], &self.tile_norms)?;
        state.serialize_field(FIELDS[1], &self.size_vectors[..])?;
        state.end()
    }
}

impl<'de, T: ShapeScalar> Deserialize<'de> for SparseShape<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename = "SparseShape")]
        struct Archived<T> {
            tile_norms: Tensor<T>,
            size_vectors: Vec<Box<[T]>>,
        }

        let archived = Archived::<T>::deserialize(deserializer)?;
        if archived.tile_norms.is_empty() && archived.size_vectors.is_empty() {
            return Ok(Self::default());
        }
        let extents = archived.tile_norms.range().extents();
        if archived.size_vectors.len() != extents.len()
            || archived
                .size_vectors
                .iter()
                .zip(extents)
                .any(|(sizes, &extent)| sizes.len() != extent)
        {
            return Err(serde::de::Error::custom(
                "size vectors do not match the tile norm range",
            ));
        }
        let threshold = T::threshold();
        let zero_tile_count = archived
            .tile_norms
            .data()
            .iter()
            .filter(|&&norm| norm < threshold)
            .count();
        Ok(Self::from_normalized(
            archived.tile_norms,
            archived.size_vectors.into(),
            zero_tile_count,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::SparseShape;
    use crate::permutation::Permutation;
    use crate::shape::gemm::GemmHelper;
    use crate::tensor::{Range, Tensor};
    use crate::tiledrange::TiledRange;

    /// 1-D shape over tile extents [2, 3, 5] with raw norms [4, 3, 0]:
    /// normalized norms are [2, 1, 0].
    fn shape_1d() -> SparseShape<f64> {
        let trange = TiledRange::from_extents([[2, 3, 5]]);
        let norms = Tensor::from_data(Range::new(vec![3]), vec![4.0, 3.0, 0.0]);
        SparseShape::new(norms, &trange)
    }

    fn unit_shape(norms: Vec<f64>) -> SparseShape<f64> {
        let tiles = norms.len();
        let trange = TiledRange::from_extents([vec![1; tiles]]);
        SparseShape::new(Tensor::from_data(Range::new(vec![tiles]), norms), &trange)
    }

    #[test]
    fn test_construction_normalizes() {
        let shape = shape_1d();
        assert_eq!(shape.data().data(), &[2.0, 1.0, 0.0]);
        assert_eq!(shape.zero_tile_count(), 1);
        assert_eq!(shape.sparsity(), 1.0 / 3.0);
        assert!(!shape.is_zero([0]));
        assert!(shape.is_zero([2]));
        assert_eq!(shape.norm([1]), 1.0);
        assert_eq!(shape.size_vector(0), &[2.0, 3.0, 5.0]);
    }

    #[test]
    fn test_construction_multidim() {
        let trange = TiledRange::from_extents([vec![2, 4], vec![3, 5]]);
        let norms = Tensor::from_data(
            Range::new(vec![2, 2]),
            vec![6.0, 10.0, 12.0, 0.0],
        );
        let shape = SparseShape::new(norms, &trange);
        assert_eq!(shape.norm([0, 0]), 1.0);
        assert_eq!(shape.norm([0, 1]), 1.0);
        assert_eq!(shape.norm([1, 0]), 1.0);
        assert_eq!(shape.norm([1, 1]), 0.0);
        assert_eq!(shape.zero_tile_count(), 1);
    }

    #[test]
    #[should_panic(expected = "non-negative")]
    fn test_rejects_negative_norms() {
        let trange = TiledRange::from_extents([[2, 3]]);
        SparseShape::new(
            Tensor::from_data(Range::new(vec![2]), vec![1.0, -1.0]),
            &trange,
        );
    }

    #[test]
    #[should_panic(expected = "do not match the tile space")]
    fn test_rejects_range_mismatch() {
        let trange = TiledRange::from_extents([[2, 3]]);
        SparseShape::new(
            Tensor::from_data(Range::new(vec![3]), vec![1.0, 1.0, 1.0]),
            &trange,
        );
    }

    #[test]
    #[should_panic(expected = "uninitialized shape")]
    fn test_empty_shape_rejects_algebra() {
        SparseShape::<f64>::default().scale(2.0);
    }

    #[test]
    fn test_is_dense_and_validate() {
        assert!(!SparseShape::<f64>::is_dense());
        let shape = shape_1d();
        assert!(shape.validate(&Range::new(vec![3])));
        assert!(!shape.validate(&Range::new(vec![4])));
        assert!(!SparseShape::<f64>::default().validate(&Range::new(vec![3])));
    }

    #[test]
    fn test_scale() {
        let shape = shape_1d();
        let halved = shape.scale(0.5);
        assert_eq!(halved.data().data(), &[1.0, 0.5, 0.0]);
        assert_eq!(halved.zero_tile_count(), 1);
        // The factor enters as a magnitude.
        assert_eq!(shape.scale(-0.5), halved);
    }

    #[test]
    fn test_scale_composition() {
        let shape = shape_1d();
        assert_eq!(shape.scale(2.0).scale(3.0), shape.scale(6.0));
    }

    #[test]
    fn test_scale_screens_out_small_norms() {
        let shape = unit_shape(vec![1.0, 1e-10]);
        assert_eq!(shape.zero_tile_count(), 0);
        let scaled = shape.scale(1e-10);
        // 1e-20 falls below the default threshold of machine epsilon.
        assert_eq!(scaled.data().data(), &[1e-10, 0.0]);
        assert_eq!(scaled.zero_tile_count(), 1);
    }

    #[test]
    fn test_permute_round_trip() {
        let trange = TiledRange::from_extents([vec![2, 4], vec![3, 5, 7]]);
        let norms = Tensor::from_data(
            Range::new(vec![2, 3]),
            vec![6.0, 10.0, 14.0, 0.0, 20.0, 28.0],
        );
        let shape = SparseShape::new(norms, &trange);
        let perm = Permutation::new(vec![1, 0]);
        let permuted = shape.permute(&perm);
        assert_eq!(permuted.zero_tile_count(), shape.zero_tile_count());
        assert_eq!(permuted.norm([0, 1]), shape.norm([1, 0]));
        assert_eq!(permuted.size_vector(0), shape.size_vector(1));
        assert_eq!(permuted.permute(&perm.inverse()), shape);
    }

    #[test]
    fn test_scale_permuted_matches_compose() {
        let trange = TiledRange::from_extents([vec![2, 4], vec![3, 5]]);
        let norms =
            Tensor::from_data(Range::new(vec![2, 2]), vec![6.0, 10.0, 12.0, 20.0]);
        let shape = SparseShape::new(norms, &trange);
        let perm = Permutation::new(vec![1, 0]);
        assert_eq!(
            shape.scale_permuted(3.0, &perm),
            shape.scale(3.0).permute(&perm)
        );
    }

    #[test]
    fn test_transform_identity_preserves() {
        let shape = shape_1d();
        assert_eq!(shape.transform(|norms| norms.clone()), shape);
    }

    #[test]
    fn test_transform_rethresholds() {
        let shape = unit_shape(vec![2.0, 4.0]);
        let transformed = shape.transform(|norms| norms.unary(|v| v - 2.0));
        assert_eq!(transformed.data().data(), &[0.0, 2.0]);
        assert_eq!(transformed.zero_tile_count(), 1);
    }

    #[test]
    #[should_panic(expected = "keep the tile range")]
    fn test_transform_rejects_range_change() {
        shape_1d().transform(|_| Tensor::new(Range::new(vec![4]), 1.0));
    }

    #[test]
    fn test_add_const() {
        // Tile extents [4, 9]: the offset enters as value / sqrt(volume).
        let trange = TiledRange::from_extents([[4, 9]]);
        let norms = Tensor::from_data(Range::new(vec![2]), vec![8.0, 18.0]);
        let shape = SparseShape::new(norms, &trange);
        let bumped = shape.add_const(-6.0);
        assert_eq!(bumped.data().data(), &[5.0, 4.0]);
    }

    #[test]
    fn test_add_const_multidim() {
        // Extents 4 x 9 make the tile volume 36 and sqrt(volume) 6.
        let trange = TiledRange::from_extents([vec![4], vec![9]]);
        let norms = Tensor::from_data(Range::new(vec![1, 1]), vec![36.0]);
        let shape = SparseShape::new(norms, &trange);
        assert_eq!(shape.norm([0, 0]), 1.0);
        assert_eq!(shape.add_const(6.0).norm([0, 0]), 2.0);
    }

    #[test]
    fn test_add_and_subt_agree() {
        let left = unit_shape(vec![5.0, 7.0]);
        let right = unit_shape(vec![2.0, 3.0]);
        let sum = left.add(&right);
        assert_eq!(sum.data().data(), &[7.0, 10.0]);
        assert_eq!(sum.zero_tile_count(), 0);
        assert_eq!(left.subt(&right), sum);
        // The sum bound is symmetric.
        assert_eq!(right.add(&left), sum);
    }

    #[test]
    fn test_add_scaled() {
        let left = unit_shape(vec![5.0, 7.0]);
        let right = unit_shape(vec![2.0, 3.0]);
        let scaled = left.add_scaled(&right, -0.5);
        assert_eq!(scaled.data().data(), &[3.5, 5.0]);
        assert_eq!(scaled, left.subt_scaled(&right, 0.5));
    }

    #[test]
    fn test_add_permuted() {
        let trange = TiledRange::from_extents([vec![2, 4], vec![3, 5]]);
        let make = |values: Vec<f64>| {
            SparseShape::new(Tensor::from_data(Range::new(vec![2, 2]), values), &trange)
        };
        let left = make(vec![6.0, 10.0, 12.0, 20.0]);
        let right = make(vec![12.0, 20.0, 24.0, 40.0]);
        let perm = Permutation::new(vec![1, 0]);
        assert_eq!(
            left.add_permuted(&right, &perm),
            left.add(&right).permute(&perm)
        );
        assert_eq!(
            left.add_scaled_permuted(&right, 2.0, &perm),
            left.add_scaled(&right, 2.0).permute(&perm)
        );
    }

    #[test]
    fn test_mult_restores_volume_factor() {
        let left = unit_shape(vec![5.0, 7.0]);
        let right = unit_shape(vec![2.0, 3.0]);
        let product = left.mult(&right);
        assert_eq!(product.data().data(), &[10.0, 21.0]);

        // With tile extents [2, 4] one volume factor is restored.
        let trange = TiledRange::from_extents([[2, 4]]);
        let make = |values: Vec<f64>| {
            SparseShape::new(Tensor::from_data(Range::new(vec![2]), values), &trange)
        };
        let a = make(vec![4.0, 8.0]); // normalized [2, 2]
        let b = make(vec![6.0, 12.0]); // normalized [3, 3]
        let ab = a.mult(&b);
        assert_eq!(ab.data().data(), &[12.0, 24.0]);
        assert_eq!(a.mult_scaled(&b, -2.0).data().data(), &[24.0, 48.0]);
    }

    #[test]
    fn test_mult_permuted() {
        let trange = TiledRange::from_extents([vec![2, 4], vec![3, 5]]);
        let make = |values: Vec<f64>| {
            SparseShape::new(Tensor::from_data(Range::new(vec![2, 2]), values), &trange)
        };
        let left = make(vec![6.0, 10.0, 12.0, 20.0]);
        let right = make(vec![12.0, 20.0, 24.0, 40.0]);
        let perm = Permutation::new(vec![1, 0]);
        assert_eq!(
            left.mult_permuted(&right, &perm),
            left.mult(&right).permute(&perm)
        );
    }

    #[test]
    fn test_mask() {
        let shape = unit_shape(vec![5.0, 7.0, 0.0, 3.0]);
        let mask = unit_shape(vec![1.0, 0.0, 1.0, 1.0]);
        let masked = shape.mask(&mask);
        assert_eq!(masked.data().data(), &[5.0, 0.0, 0.0, 3.0]);
        assert_eq!(masked.zero_tile_count(), 2);
        for t in 0..4usize {
            if mask.is_zero(t) {
                assert!(masked.is_zero(t));
            }
        }
    }

    #[test]
    fn test_update_block() {
        let shape = unit_shape(vec![2.0, 0.0, 0.0, 2.0, 2.0]);
        assert_eq!(shape.zero_tile_count(), 2);
        let patch = unit_shape(vec![1.0, 0.0]);
        let updated = shape.update_block(&[1], &[3], &patch);
        assert_eq!(updated.data().data(), &[2.0, 1.0, 0.0, 2.0, 2.0]);
        // One cell crossed zero -> nonzero, the other stayed zero.
        assert_eq!(updated.zero_tile_count(), 1);
    }

    #[test]
    fn test_update_block_restores_original() {
        let shape = unit_shape(vec![2.0, 0.0, 0.0, 2.0, 2.0]);
        let restored = shape.update_block(&[1], &[3], &shape.block(&[1], &[3]));
        assert_eq!(restored, shape);
    }

    #[test]
    fn test_block() {
        let shape = shape_1d();
        let tail = shape.block(&[1], &[3]);
        assert_eq!(tail.data().data(), &[1.0, 0.0]);
        assert_eq!(tail.zero_tile_count(), 1);
        assert_eq!(tail.size_vector(0), &[3.0, 5.0]);
        // A sub-block of the whole sub-block is the sub-block itself.
        assert_eq!(tail.block(&[0], &[2]), tail);
    }

    #[test]
    fn test_block_scaled() {
        let shape = shape_1d();
        let scaled = shape.block_scaled(&[0], &[2], -2.0);
        assert_eq!(scaled.data().data(), &[4.0, 2.0]);
        assert_eq!(scaled.zero_tile_count(), 0);
    }

    #[test]
    fn test_block_permuted() {
        let trange = TiledRange::from_extents([vec![2, 4, 6], vec![3, 5]]);
        let norms = Tensor::from_data(
            Range::new(vec![3, 2]),
            vec![6.0, 10.0, 12.0, 20.0, 18.0, 30.0],
        );
        let shape = SparseShape::new(norms, &trange);
        let perm = Permutation::new(vec![1, 0]);
        assert_eq!(
            shape.block_permuted(&[1, 0], &[3, 2], &perm),
            shape.block(&[1, 0], &[3, 2]).permute(&perm)
        );
        assert_eq!(
            shape.block_scaled_permuted(&[1, 0], &[3, 2], 2.0, &perm),
            shape.block_scaled(&[1, 0], &[3, 2], 2.0).permute(&perm)
        );
    }

    #[test]
    #[should_panic(expected = "invalid for extents")]
    fn test_block_rejects_inverted_bounds() {
        shape_1d().block(&[2], &[1]);
    }

    #[test]
    fn test_gemm_matrix_contraction() {
        // 2x2 shapes with unit tiles: A = [[1, 0], [0, 1]], B all ones.
        let trange = TiledRange::from_extents([vec![1, 1], vec![1, 1]]);
        let make = |values: Vec<f64>| {
            SparseShape::new(Tensor::from_data(Range::new(vec![2, 2]), values), &trange)
        };
        let a = make(vec![1.0, 0.0, 0.0, 1.0]);
        let b = make(vec![1.0, 1.0, 1.0, 1.0]);
        let helper = GemmHelper::new(2, 2, 1);
        let c = a.gemm(&b, 1.0, &helper);
        assert_eq!(c.data().data(), &[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(c.zero_tile_count(), 0);
        assert_eq!(c.size_vector(0), &[1.0, 1.0]);
    }

    #[test]
    fn test_gemm_reintroduces_inner_volumes() {
        // Contract over a dimension with tile extents [2, 3]; tiles are 1
        // element wide along the outer dimensions.
        let left_trange = TiledRange::from_extents([vec![1], vec![2, 3]]);
        let right_trange = TiledRange::from_extents([vec![2, 3], vec![1]]);
        let left = SparseShape::new(
            Tensor::from_data(Range::new(vec![1, 2]), vec![2.0, 3.0]),
            &left_trange,
        );
        let right = SparseShape::new(
            Tensor::from_data(Range::new(vec![2, 1]), vec![4.0, 6.0]),
            &right_trange,
        );
        // Normalized: left [1, 1], right [2, 2]. Reintroducing the inner
        // extents [2, 3] gives sum_k k_k^2 * 1 * 2 = (4 + 9) * 2 / 1.
        let helper = GemmHelper::new(2, 2, 1);
        let c = left.gemm(&right, 1.0, &helper);
        assert_eq!(c.norm([0, 0]), 26.0);
    }

    #[test]
    fn test_gemm_outer_product() {
        let trange = TiledRange::from_extents([[2, 3]]);
        let left = SparseShape::new(
            Tensor::from_data(Range::new(vec![2]), vec![4.0, 0.0]),
            &trange,
        );
        let right = SparseShape::new(
            Tensor::from_data(Range::new(vec![2]), vec![6.0, 3.0]),
            &trange,
        );
        let helper = GemmHelper::new(1, 1, 0);
        let outer = left.gemm(&right, 2.0, &helper);
        assert_eq!(outer.data().range().extents(), &[2, 2]);
        // Normalized left [2, 0], right [3, 1]: outer entries scaled by 2.
        assert_eq!(outer.data().data(), &[12.0, 4.0, 0.0, 0.0]);
        assert_eq!(outer.zero_tile_count(), 2);
        assert_eq!(outer.size_vector(0), &[2.0, 3.0]);
        assert_eq!(outer.size_vector(1), &[2.0, 3.0]);
    }

    #[test]
    fn test_gemm_permuted() {
        let trange = TiledRange::from_extents([vec![1, 1], vec![1, 1]]);
        let make = |values: Vec<f64>| {
            SparseShape::new(Tensor::from_data(Range::new(vec![2, 2]), values), &trange)
        };
        let a = make(vec![1.0, 2.0, 3.0, 4.0]);
        let b = make(vec![5.0, 6.0, 7.0, 8.0]);
        let helper = GemmHelper::new(2, 2, 1);
        let perm = Permutation::new(vec![1, 0]);
        assert_eq!(
            a.gemm_permuted(&b, 1.0, &helper, &perm),
            a.gemm(&b, 1.0, &helper).permute(&perm)
        );
    }

    #[test]
    fn test_shared_size_vectors() {
        let shape = shape_1d();
        let scaled = shape.scale(2.0);
        assert!(Arc::ptr_eq(&shape.size_vectors, &scaled.size_vectors));
        let masked = shape.mask(&shape);
        assert!(Arc::ptr_eq(&shape.size_vectors, &masked.size_vectors));
        // Slicing and reordering allocate fresh vectors.
        let perm = Permutation::new(vec![0]);
        assert!(!Arc::ptr_eq(&shape.size_vectors, &shape.permute(&perm).size_vectors));
    }

    #[test]
    fn test_serialization_round_trip() {
        let shape = shape_1d();
        let bytes = bincode::serialize(&shape).unwrap();
        let restored: SparseShape<f64> = bincode::deserialize(&bytes).unwrap();
        assert_eq!(restored, shape);
        assert_eq!(restored.zero_tile_count(), 1);
    }

    #[test]
    fn test_serialization_empty_shape() {
        let bytes = bincode::serialize(&SparseShape::<f64>::default()).unwrap();
        let restored: SparseShape<f64> = bincode::deserialize(&bytes).unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn test_display() {
        let rendered = format!("{}", shape_1d());
        assert!(rendered.starts_with("SparseShape<f64>:"));
    }
}
