use itertools::Itertools;
use rand::distributions::{Distribution, Uniform};
use rand::Rng;

use crate::shape::sparse::SparseShape;
use crate::tensor::Tensor;
use crate::tiledrange::{TiledRange, TiledRange1};
use crate::types::ShapeScalar;

/// Generates a random tiled range with `rank` dimensions, each holding
/// between 1 and 4 tiles of 1 to 20 elements.
///
/// # Arguments
///
/// * `rank` - Number of dimensions of the tiled range
/// * `rng` - The random number generator to use.
///
/// # Examples
/// ```
/// use tilesparse::random::shapegeneration::random_tiled_range_with_rng;
/// let trange = random_tiled_range_with_rng(3, &mut rand::thread_rng());
/// assert_eq!(trange.rank(), 3);
/// ```
pub fn random_tiled_range_with_rng<R>(rank: usize, rng: &mut R) -> TiledRange
where
    R: Rng + ?Sized,
{
    let tiles = Uniform::new_inclusive(1usize, 4);
    let extents = Uniform::new_inclusive(1usize, 20);
    TiledRange::new(
        (0..rank)
            .map(|_| {
                TiledRange1::from_extents(
                    (0..tiles.sample(rng))
                        .map(|_| extents.sample(rng))
                        .collect_vec(),
                )
            })
            .collect_vec(),
    )
}

/// Generates a random tiled range with `rank` dimensions. Uses the
/// thread-local random number generator.
pub fn random_tiled_range(rank: usize) -> TiledRange {
    random_tiled_range_with_rng(rank, &mut rand::thread_rng())
}

/// Generates random raw tile norms over the tile space of `trange`.
///
/// Each tile receives a norm uniformly drawn from `[0.5, 10)` times its
/// element count, or exactly zero with probability `sparsity` (defaulting
/// to 0.5), so the constructed shape screens roughly that fraction of
/// tiles.
///
/// # Arguments
///
/// * `trange` - Tiled range whose tile space the norms cover
/// * `sparsity` - Optional fraction of zero tiles between 0 and 1
/// * `rng` - The random number generator to use.
pub fn random_tile_norms_with_rng<T, R>(
    trange: &TiledRange,
    sparsity: Option<f64>,
    rng: &mut R,
) -> Tensor<T>
where
    T: ShapeScalar,
    R: Rng + ?Sized,
{
    let sparsity = sparsity.unwrap_or(0.5);
    assert!(
        (0.0..=1.0).contains(&sparsity),
        "sparsity {sparsity} must lie in [0, 1]"
    );
    let range = trange.tiles_range();
    let volumes = trange
        .dims()
        .map(|dim| dim.tile_extents().collect_vec())
        .collect_vec();
    let magnitude = Uniform::new(0.5f64, 10.0);
    let mut data = Vec::with_capacity(range.volume());
    range.for_each_index(|_, index| {
        let value = if rng.gen::<f64>() < sparsity {
            0.0
        } else {
            let volume: usize = index.iter().zip(&volumes).map(|(&i, v)| v[i]).product();
            magnitude.sample(rng) * volume as f64
        };
        data.push(T::from_f64(value));
    });
    Tensor::from_data(range, data)
}

/// Generates random raw tile norms over the tile space of `trange`. Uses
/// the thread-local random number generator.
pub fn random_tile_norms<T: ShapeScalar>(trange: &TiledRange, sparsity: Option<f64>) -> Tensor<T> {
    random_tile_norms_with_rng(trange, sparsity, &mut rand::thread_rng())
}

/// Generates a random shape over the tile space of `trange` with roughly
/// the given fraction of screened tiles.
///
/// # Examples
/// ```
/// use tilesparse::random::shapegeneration::{random_shape_with_rng, random_tiled_range_with_rng};
/// let mut rng = rand::thread_rng();
/// let trange = random_tiled_range_with_rng(2, &mut rng);
/// let shape = random_shape_with_rng::<f64, _>(&trange, Some(0.3), &mut rng);
/// assert!(!shape.is_empty());
/// ```
pub fn random_shape_with_rng<T, R>(
    trange: &TiledRange,
    sparsity: Option<f64>,
    rng: &mut R,
) -> SparseShape<T>
where
    T: ShapeScalar,
    R: Rng + ?Sized,
{
    SparseShape::new(random_tile_norms_with_rng(trange, sparsity, rng), trange)
}

/// Generates a random shape over the tile space of `trange`. Uses the
/// thread-local random number generator.
pub fn random_shape<T: ShapeScalar>(trange: &TiledRange, sparsity: Option<f64>) -> SparseShape<T> {
    random_shape_with_rng(trange, sparsity, &mut rand::thread_rng())
}
