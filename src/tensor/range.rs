use serde::{Deserialize, Serialize};

use crate::permutation::Permutation;

/// Dense N-dimensional rectangular index space with row-major layout.
///
/// # Examples
/// ```
/// use tilesparse::tensor::range::Range;
/// let range = Range::new(vec![3, 4]);
/// assert_eq!(range.volume(), 12);
/// assert_eq!(range.ordinal(&[2, 1]), 9);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Range {
    extents: Vec<usize>,
    strides: Vec<usize>,
    volume: usize,
}

impl Range {
    /// Constructs an index space from per-dimension extents.
    ///
    /// # Panics
    /// Panics if `extents` is empty or any extent is zero.
    pub fn new(extents: Vec<usize>) -> Self {
        assert!(!extents.is_empty(), "a range requires at least one dimension");
        assert!(
            extents.iter().all(|&extent| extent > 0),
            "range extents {extents:?} must be positive"
        );
        let mut strides = vec![1; extents.len()];
        for d in (0..extents.len() - 1).rev() {
            strides[d] = strides[d + 1] * extents[d + 1];
        }
        let volume = strides[0] * extents[0];
        Self {
            extents,
            strides,
            volume,
        }
    }

    /// Returns the number of dimensions, zero for the default (empty) range.
    pub fn rank(&self) -> usize {
        self.extents.len()
    }

    /// Returns the per-dimension extents.
    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    /// Returns the extent of dimension `d`.
    pub fn extent(&self, d: usize) -> usize {
        self.extents[d]
    }

    /// Returns the row-major stride of dimension `d`.
    pub fn stride(&self, d: usize) -> usize {
        self.strides[d]
    }

    /// Returns the total number of positions, zero for the default range.
    pub fn volume(&self) -> usize {
        self.volume
    }

    /// Returns true for the default-constructed range.
    pub fn is_empty(&self) -> bool {
        self.extents.is_empty()
    }

    /// Returns the flattened position of `index`.
    ///
    /// # Panics
    /// Panics if `index` has the wrong rank or lies outside the extents.
    pub fn ordinal(&self, index: &[usize]) -> usize {
        assert_eq!(
            index.len(),
            self.rank(),
            "index {index:?} does not match range rank {}",
            self.rank()
        );
        index
            .iter()
            .zip(&self.extents)
            .zip(&self.strides)
            .map(|((&i, &extent), &stride)| {
                assert!(i < extent, "index {index:?} lies outside extents {:?}", self.extents);
                i * stride
            })
            .sum()
    }

    /// Returns the index space with dimensions reordered by `perm`.
    pub fn permute(&self, perm: &Permutation) -> Self {
        Self::new(perm.permute(&self.extents))
    }

    /// Invokes `f(ordinal, index)` for every position in row-major order.
    pub fn for_each_index(&self, mut f: impl FnMut(usize, &[usize])) {
        let mut index = vec![0; self.rank()];
        for ordinal in 0..self.volume {
            f(ordinal, &index);
            for d in (0..index.len()).rev() {
                index[d] += 1;
                if index[d] < self.extents[d] {
                    break;
                }
                index[d] = 0;
            }
        }
    }
}

/// A position in a [`Range`], either as a flattened ordinal or as a
/// per-dimension index tuple.
pub trait TensorIndex {
    /// Resolves this position to its row-major ordinal within `range`.
    fn ordinal(&self, range: &Range) -> usize;
}

impl TensorIndex for usize {
    fn ordinal(&self, range: &Range) -> usize {
        assert!(
            *self < range.volume(),
            "ordinal {self} lies outside a range of volume {}",
            range.volume()
        );
        *self
    }
}

impl TensorIndex for &[usize] {
    fn ordinal(&self, range: &Range) -> usize {
        range.ordinal(self)
    }
}

impl<const N: usize> TensorIndex for [usize; N] {
    fn ordinal(&self, range: &Range) -> usize {
        range.ordinal(self)
    }
}

impl TensorIndex for &Vec<usize> {
    fn ordinal(&self, range: &Range) -> usize {
        range.ordinal(self)
    }
}
