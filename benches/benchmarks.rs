use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tilesparse::random::shapegeneration::{random_shape_with_rng, random_tile_norms_with_rng};
use tilesparse::shape::gemm::GemmHelper;
use tilesparse::shape::sparse::SparseShape;
use tilesparse::tiledrange::{TiledRange, TiledRange1};

/// A square 2-D tiled range with `tiles` tiles of 8 elements per dimension.
fn square_trange(tiles: usize) -> TiledRange {
    TiledRange::new(vec![
        TiledRange1::from_extents(vec![8; tiles]),
        TiledRange1::from_extents(vec![8; tiles]),
    ])
}

/// Benchmark for the normalization pass of the constructor.
pub fn construction_benchmark(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(52);
    let mut group = c.benchmark_group("Construction");

    for tiles in [16, 32, 64] {
        let trange = square_trange(tiles);
        let norms = random_tile_norms_with_rng::<f64, _>(&trange, Some(0.5), &mut rng);

        group.bench_function(BenchmarkId::from_parameter(tiles), |b| {
            b.iter_batched(
                || norms.clone(),
                |norms| SparseShape::new(black_box(norms), &trange),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

/// Benchmark for the element-wise shape algebra.
pub fn elementwise_benchmark(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(23);
    let mut group = c.benchmark_group("Elementwise");

    for tiles in [16, 32, 64] {
        let trange = square_trange(tiles);
        let left = random_shape_with_rng::<f64, _>(&trange, Some(0.5), &mut rng);
        let right = random_shape_with_rng::<f64, _>(&trange, Some(0.5), &mut rng);

        group.bench_function(BenchmarkId::new("scale", tiles), |b| {
            b.iter(|| left.scale(black_box(0.5)));
        });
        group.bench_function(BenchmarkId::new("add", tiles), |b| {
            b.iter(|| left.add(black_box(&right)));
        });
        group.bench_function(BenchmarkId::new("mult", tiles), |b| {
            b.iter(|| left.mult(black_box(&right)));
        });
    }
    group.finish();
}

/// Benchmark for the contraction bound.
pub fn contraction_benchmark(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(37);
    let mut group = c.benchmark_group("Contraction");
    let helper = GemmHelper::new(2, 2, 1);

    for tiles in [8, 16, 32] {
        let trange = square_trange(tiles);
        let left = random_shape_with_rng::<f64, _>(&trange, Some(0.5), &mut rng);
        let right = random_shape_with_rng::<f64, _>(&trange, Some(0.5), &mut rng);

        group.bench_function(BenchmarkId::from_parameter(tiles), |b| {
            b.iter(|| left.gemm(black_box(&right), 1.0, &helper));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    construction_benchmark,
    elementwise_benchmark,
    contraction_benchmark
);
criterion_main!(benches);
