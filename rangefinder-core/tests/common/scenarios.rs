//! Ready-made pipelines and frame sequences

use std::sync::Arc;

use rangefinder_core::config::RangingConfig;
use rangefinder_core::pipeline::{FrameInput, FramePipeline, Orientation, PositionFix, RangingContext};
use rangefinder_core::terrain::{TileCache, TileKey};
use rangefinder_core::time::Timestamp;
use rangefinder_core::types::GeoPoint;

use super::generators::{flat_metric, flat_neural, flat_tile};

/// Tile used by the terrain scenarios
pub const TILE: TileKey = TileKey { lat: 37, lon: -122 };

/// Ground elevation of [`flat_terrain`] (m)
pub const GROUND_M: f64 = 100.0;

/// Observer standing on a ridge 40 m above the plain
pub fn observer() -> PositionFix {
    PositionFix {
        point: GeoPoint::new(37.5, -121.5, GROUND_M + 40.0),
        horizontal_accuracy_m: 3.0,
        vertical_accuracy_m: 2.0,
    }
}

/// Orientation looking north at `pitch_deg`
pub fn looking_north(pitch_deg: f64) -> Orientation {
    Orientation {
        pitch_rad: pitch_deg.to_radians(),
        heading_deg: 0.0,
        angular_velocity_rad_s: 0.01,
        heading_accuracy_deg: 2.0,
    }
}

/// Tile cache holding one flat tile at [`GROUND_M`]
pub fn flat_terrain() -> Arc<TileCache> {
    let cache = Arc::new(TileCache::default());
    cache.insert(flat_tile(TILE, GROUND_M));
    cache
}

/// Pipeline with default configuration
pub fn pipeline() -> FramePipeline {
    let context = RangingContext::new(RangingConfig::default()).unwrap();
    FramePipeline::new(Arc::new(context))
}

/// Pipeline casting rays against resident `tiles`
pub fn pipeline_with_terrain(tiles: Arc<TileCache>) -> FramePipeline {
    let context = RangingContext::new(RangingConfig::default())
        .unwrap()
        .with_tiles(tiles);
    FramePipeline::new(Arc::new(context))
}

/// Feed `frames` level frames pairing short-range truth with neural output
///
/// Distances sweep 1 m to 7 m so the calibrator sees a spread of ground
/// truth. Returns the timestamp after the last frame.
pub fn calibrate(pipeline: &FramePipeline, start: Timestamp, frames: u64) -> Timestamp {
    let mut ts = start;
    for i in 0..frames {
        let d = 1.0 + 6.0 * (i as f32) / (frames.max(2) - 1) as f32;
        let input = FrameInput::new(ts, looking_north(0.0))
            .with_short_range(flat_metric(d))
            .with_neural(flat_neural(d));
        pipeline.process(&input).unwrap();
        ts += 100;
    }
    ts
}
