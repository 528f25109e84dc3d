use flexi_logger::{opt_format, Logger};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tilesparse::permutation::Permutation;
use tilesparse::random::shapegeneration::random_shape_with_rng;
use tilesparse::shape::gemm::GemmHelper;
use tilesparse::shape::sparse::SparseShape;
use tilesparse::tiledrange::TiledRange;

/// Walks through the shape algebra on randomly generated tile norms.
fn main() {
    let _logger = Logger::try_with_str("debug")
        .unwrap()
        .format(opt_format)
        .start()
        .unwrap();
    let mut rng = StdRng::seed_from_u64(23);

    SparseShape::<f64>::set_threshold(1e-6);
    info!("Running basic_usage");

    // Two matrix-like shapes sharing the contracted dimension.
    let i_tiles = vec![4, 6, 2];
    let j_tiles = vec![3, 5];
    let k_tiles = vec![2, 2, 4];
    let left = random_shape_with_rng::<f64, _>(
        &TiledRange::from_extents([i_tiles.clone(), j_tiles.clone()]),
        Some(0.6),
        &mut rng,
    );
    let right = random_shape_with_rng::<f64, _>(
        &TiledRange::from_extents([j_tiles, k_tiles]),
        Some(0.6),
        &mut rng,
    );
    info!(
        "left shape screens {:.0}% of its tiles, right shape {:.0}%",
        100.0 * left.sparsity(),
        100.0 * right.sparsity()
    );

    let scaled = left.scale(0.5);
    info!("after scaling, {} tiles remain zero", scaled.zero_tile_count());

    let bound = left.gemm(&right, 1.0, &GemmHelper::new(2, 2, 1));
    info!(
        "contraction bound screens {} of {} result tiles",
        bound.zero_tile_count(),
        bound.data().range().volume()
    );

    let transposed = bound.permute(&Permutation::new(vec![1, 0]));
    info!("transposed bound:\n{transposed}");
}
