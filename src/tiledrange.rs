use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::tensor::range::Range;

/// Tiling of a single dimension into contiguous element intervals.
///
/// The tiling is stored as monotonically increasing boundaries
/// `b_0 < b_1 < ... < b_n`; tile `k` spans elements `[b_k, b_{k+1})`.
///
/// # Examples
/// ```
/// use tilesparse::tiledrange::TiledRange1;
/// let dim = TiledRange1::new(vec![0, 2, 5, 10]);
/// assert_eq!(dim.tile_count(), 3);
/// assert_eq!(dim.tile_extent(1), 3);
/// assert_eq!(dim.elements(), 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TiledRange1 {
    boundaries: Vec<usize>,
}

impl TiledRange1 {
    /// Constructs a tiling from its element boundaries.
    ///
    /// # Panics
    /// Panics unless there are at least two boundaries and they are strictly
    /// increasing (every tile must hold at least one element).
    pub fn new(boundaries: Vec<usize>) -> Self {
        assert!(
            boundaries.len() >= 2,
            "a tiled dimension requires at least one tile"
        );
        assert!(
            boundaries.windows(2).all(|pair| pair[0] < pair[1]),
            "tile boundaries {boundaries:?} must be strictly increasing"
        );
        Self { boundaries }
    }

    /// Constructs a tiling starting at element 0 from per-tile extents.
    ///
    /// # Examples
    /// ```
    /// use tilesparse::tiledrange::TiledRange1;
    /// let dim = TiledRange1::from_extents([2, 3, 5]);
    /// assert_eq!(dim, TiledRange1::new(vec![0, 2, 5, 10]));
    /// ```
    pub fn from_extents(extents: impl IntoIterator<Item = usize>) -> Self {
        let boundaries = std::iter::once(0)
            .chain(extents.into_iter().scan(0, |total, extent| {
                *total += extent;
                Some(*total)
            }))
            .collect();
        Self::new(boundaries)
    }

    /// Returns the number of tiles.
    pub fn tile_count(&self) -> usize {
        self.boundaries.len() - 1
    }

    /// Returns the element interval `[lower, upper)` of tile `k`.
    pub fn tile(&self, k: usize) -> (usize, usize) {
        (self.boundaries[k], self.boundaries[k + 1])
    }

    /// Returns the number of elements in tile `k`.
    pub fn tile_extent(&self, k: usize) -> usize {
        self.boundaries[k + 1] - self.boundaries[k]
    }

    /// Iterates over the per-tile element counts.
    pub fn tile_extents(&self) -> impl Iterator<Item = usize> + '_ {
        self.boundaries.windows(2).map(|pair| pair[1] - pair[0])
    }

    /// Returns the total number of elements across all tiles.
    pub fn elements(&self) -> usize {
        self.boundaries[self.boundaries.len() - 1] - self.boundaries[0]
    }
}

/// Tiling of an N-dimensional element space, one [`TiledRange1`] per
/// dimension.
///
/// # Examples
/// ```
/// use tilesparse::tiledrange::{TiledRange, TiledRange1};
/// let trange = TiledRange::new(vec![
///     TiledRange1::from_extents([2, 3]),
///     TiledRange1::from_extents([4, 4, 4]),
/// ]);
/// assert_eq!(trange.rank(), 2);
/// assert_eq!(trange.tiles_range().extents(), &[2, 3]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TiledRange {
    dims: Vec<TiledRange1>,
}

impl TiledRange {
    /// Constructs a tiled range from per-dimension tilings.
    ///
    /// # Panics
    /// Panics if `dims` is empty.
    pub fn new(dims: Vec<TiledRange1>) -> Self {
        assert!(!dims.is_empty(), "a tiled range requires at least one dimension");
        Self { dims }
    }

    /// Constructs a tiled range from per-dimension tile extent lists, each
    /// dimension starting at element 0.
    pub fn from_extents<I>(extents_per_dim: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoIterator<Item = usize>,
    {
        Self::new(
            extents_per_dim
                .into_iter()
                .map(TiledRange1::from_extents)
                .collect_vec(),
        )
    }

    /// Returns the number of dimensions.
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Returns the tiling of dimension `d`.
    pub fn dim(&self, d: usize) -> &TiledRange1 {
        &self.dims[d]
    }

    /// Iterates over the per-dimension tilings.
    pub fn dims(&self) -> impl Iterator<Item = &TiledRange1> {
        self.dims.iter()
    }

    /// Returns the tile index space: one slot per tile in each dimension.
    pub fn tiles_range(&self) -> Range {
        Range::new(self.dims.iter().map(TiledRange1::tile_count).collect())
    }
}
