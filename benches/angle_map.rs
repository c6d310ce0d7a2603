use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use stecars::data::Image;
use stecars::geometry::{AngleMap, AngleMapKey, Geometry, ImageCut, Size2d, IJ};
use stecars::session::{project_cluster, IntensityScaling, ProjectionParams};

fn key(size: usize) -> AngleMapKey {
    AngleMapKey::new(
        Geometry::new(1035.0, 1.0, IJ::default()),
        Size2d::new(size, size),
        ImageCut::uniform(8),
        40.0,
    )
}

fn bench_angle_map(c: &mut Criterion) {
    let key = key(512);
    c.bench_function("angle_map_512", |b| {
        b.iter(|| black_box(AngleMap::new(black_box(key))))
    });
}

fn bench_project(c: &mut Criterion) {
    let map = AngleMap::new(key(512));
    let image = Image::filled(Size2d::new(512, 512), 3.0);
    let params = ProjectionParams {
        rge_tth: map.rge_tth(),
        rge_gma: map.rge_gma(),
        num_bins: 496,
        correction: None,
        intensity: IntensityScaling::default(),
        norm_factor: 1.0,
    };

    c.bench_function("project_cluster_512", |b| {
        b.iter(|| black_box(project_cluster(&[(&image, &map)], &params)))
    });
}

criterion_group!(benches, bench_angle_map, bench_project);
criterion_main!(benches);
