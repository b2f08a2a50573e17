//! Benchmark per-frame pipeline cost.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use std::sync::Arc;

use rangefinder_core::config::{RangingConfig, TerrainConfig};
use rangefinder_core::confidence::SourceConfidenceModel;
use rangefinder_core::pipeline::{FrameInput, FramePipeline, Orientation, PositionFix, RangingContext};
use rangefinder_core::scene::{DepthEncoding, DepthMap};
use rangefinder_core::terrain::{ElevationTile, RayQuery, TerrainRayCaster, TileCache, TileKey};
use rangefinder_core::types::GeoPoint;

const TILE: TileKey = TileKey { lat: 37, lon: -122 };

fn terrain() -> Arc<TileCache> {
    let cache = Arc::new(TileCache::default());
    let tile = ElevationTile::from_fn(TILE, 1201, |lat, _| 100.0 + (lat - 37.0) * 400.0).unwrap();
    cache.insert(tile);
    cache
}

fn observer() -> PositionFix {
    PositionFix {
        point: GeoPoint::new(37.5, -121.5, 340.0),
        horizontal_accuracy_m: 4.0,
        vertical_accuracy_m: 3.0,
    }
}

fn neural_map(width: usize, height: usize) -> DepthMap {
    // Near post on the left, hillside beyond
    DepthMap::from_fn(width, height, DepthEncoding::InverseRelative, |x, y| {
        if x < width / 2 {
            0.5
        } else {
            0.02 + 0.05 * y as f32 / height as f32
        }
    })
    .unwrap()
}

fn calibrated_pipeline() -> FramePipeline {
    let context = RangingContext::new(RangingConfig::default())
        .unwrap()
        .with_tiles(terrain());
    for i in 0..20u64 {
        let truth = 0.5 + i as f64 * 0.35;
        let _ = context.calibrator().add_pair(10.0 / truth, truth, 1.0, i * 66);
    }
    FramePipeline::new(Arc::new(context))
}

fn bench_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_pipeline");
    for &(w, h) in &[(64usize, 48usize), (256, 192)] {
        let pipeline = calibrated_pipeline();
        let map = neural_map(w, h);
        let mut ts = 10_000u64;
        group.bench_with_input(BenchmarkId::new("process", format!("{w}x{h}")), &map, |b, map| {
            b.iter(|| {
                ts += 66;
                let orientation = Orientation {
                    pitch_rad: (-3.0f64).to_radians(),
                    heading_deg: 0.0,
                    angular_velocity_rad_s: 0.02,
                    heading_accuracy_deg: 3.0,
                };
                let input = FrameInput::new(ts, orientation)
                    .with_neural(map.clone())
                    .with_position(observer());
                black_box(pipeline.process(black_box(&input)))
            })
        });
    }
    group.finish();
}

fn bench_ray_cast(c: &mut Criterion) {
    let cache = terrain();
    let caster = TerrainRayCaster::new(TerrainConfig::default(), SourceConfidenceModel::default());
    let fix = observer();
    c.bench_function("terrain_cast_-3deg", |b| {
        let query = RayQuery::new(fix.point, 0.0, (-3.0f64).to_radians()).with_accuracy(4.0, 3.0, 3.0);
        b.iter(|| black_box(caster.cast(&*cache, black_box(&query))))
    });
}

criterion_group!(benches, bench_process, bench_ray_cast);
criterion_main!(benches);
