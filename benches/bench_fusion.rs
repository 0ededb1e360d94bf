use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use sem3d::fusion::{FusionEngine, LocalSubmapBuilder};
use sem3d::pointcloud::PointCloud;
use sem3d::semantics::SemanticDistribution;
use sem3d::transform::Transform;
use sem3d::voxel::{OccupancyParams, VoxelMap};

const NUM_SCANS: usize = 4;
const NUM_POINTS: usize = 20_000;

fn random_scan(rng: &mut StdRng) -> PointCloud {
    PointCloud::from_points(Array2::from_shape_fn((NUM_POINTS, 3), |_| {
        rng.gen_range(-4.0..4.0)
    }))
}

fn fusion_benchmark(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(13);
    let scans = (0..NUM_SCANS)
        .map(|_| random_scan(&mut rng))
        .collect::<Vec<_>>();
    let labels = (0..NUM_SCANS)
        .map(|class| SemanticDistribution::one_hot(NUM_SCANS, class).unwrap())
        .collect::<Vec<_>>();
    let origin = Transform::eye();
    let builder = LocalSubmapBuilder::new(NUM_SCANS, 0.1, OccupancyParams::default()).unwrap();

    c.bench_function("Local map building", |b| {
        b.iter(|| builder.build(&scans[0], &labels[0], &origin).unwrap());
    });

    let locals = scans
        .iter()
        .zip(labels.iter())
        .map(|(scan, label)| builder.build(scan, label, &origin).unwrap())
        .collect::<Vec<_>>();
    let engine = FusionEngine::default();
    c.bench_function("Local map fusion", |b| {
        b.iter(|| {
            let mut global = VoxelMap::new(0.1, OccupancyParams::default()).unwrap();
            for local in locals.iter().cloned() {
                engine.fuse(local, &mut global).unwrap();
            }
            global
        });
    });
}

criterion_group!(benches, fusion_benchmark);
criterion_main!(benches);
