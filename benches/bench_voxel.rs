use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tabletop_core::{PointCloud, PointXYZRGB};
use tabletop_filters::{passthrough_filter, voxel_downsample, Axis};

/// A depth-camera-sized colored frame: points in a 1.2 m x 0.9 m x 1.5 m box.
fn camera_frame(n: usize, seed: u64) -> PointCloud {
    let mut rng = StdRng::seed_from_u64(seed);
    let points: Vec<PointXYZRGB> = (0..n)
        .map(|_| {
            PointXYZRGB::new(
                [
                    rng.gen_range(-0.6f32..0.6),
                    rng.gen_range(-0.45f32..0.45),
                    rng.gen_range(0.2f32..1.7),
                ],
                [rng.gen(), rng.gen(), rng.gen()],
            )
        })
        .collect();
    PointCloud::from_points(&points)
}

fn bench_voxel(c: &mut Criterion) {
    let mut group = c.benchmark_group("voxel_downsample_5mm");
    for size in [10_000, 100_000, 1_000_000] {
        let cloud = camera_frame(size, 42);
        group.bench_with_input(BenchmarkId::new("tabletop-rs", size), &cloud, |b, cloud| {
            b.iter(|| voxel_downsample(cloud, 0.005))
        });
    }
    group.finish();
}

fn bench_passthrough(c: &mut Criterion) {
    let mut group = c.benchmark_group("passthrough_filter_z");
    for size in [100_000, 1_000_000] {
        let cloud = camera_frame(size, 42);
        group.bench_with_input(BenchmarkId::new("tabletop-rs", size), &cloud, |b, cloud| {
            b.iter(|| passthrough_filter(cloud, Axis::Z, 0.0, 1.0))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_voxel, bench_passthrough);
criterion_main!(benches);
