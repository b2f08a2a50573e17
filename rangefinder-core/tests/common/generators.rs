//! Deterministic test data generators
//!
//! Depth maps follow the sensor conventions of the core: short-range maps are
//! metric, neural maps are inverse-relative (`raw = scale / distance`).

use rangefinder_core::scene::{DepthEncoding, DepthMap};
use rangefinder_core::terrain::{ElevationTile, TileKey};

/// Scale of the synthetic neural network output: `raw = NEURAL_SCALE / d`
pub const NEURAL_SCALE: f32 = 10.0;

/// Default map size (px)
pub const MAP_WIDTH: usize = 64;
/// Default map size (px)
pub const MAP_HEIGHT: usize = 48;

/// Small xorshift generator so runs are reproducible
pub struct TestRng {
    state: u32,
}

impl TestRng {
    pub fn new(seed: u32) -> Self {
        Self { state: seed.max(1) }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 17;
        self.state ^= self.state << 5;
        self.state
    }

    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32() >> 8) / 16_777_216.0
    }

    pub fn gen_range(&mut self, min: f64, max: f64) -> f64 {
        min + self.next_f64() * (max - min)
    }
}

/// Metric map with the same depth everywhere
pub fn flat_metric(distance_m: f32) -> DepthMap {
    DepthMap::from_fn(MAP_WIDTH, MAP_HEIGHT, DepthEncoding::Metric, |_, _| distance_m).unwrap()
}

/// Neural map of a scene at a single depth
pub fn flat_neural(distance_m: f32) -> DepthMap {
    DepthMap::from_fn(MAP_WIDTH, MAP_HEIGHT, DepthEncoding::InverseRelative, |_, _| {
        NEURAL_SCALE / distance_m
    })
    .unwrap()
}

/// Neural map with a near object filling the left half of the frame centre
///
/// The aim point (centre) sits on the near object.
pub fn split_neural(near_m: f32, far_m: f32) -> DepthMap {
    DepthMap::from_fn(MAP_WIDTH, MAP_HEIGHT, DepthEncoding::InverseRelative, |x, _| {
        let d = if x <= MAP_WIDTH / 2 + 4 { near_m } else { far_m };
        NEURAL_SCALE / d
    })
    .unwrap()
}

/// Tile at constant elevation
pub fn flat_tile(key: TileKey, elevation_m: f64) -> ElevationTile {
    ElevationTile::from_fn(key, 1201, |_, _| elevation_m).unwrap()
}

/// Tile rising northwards by `gradient` metres per degree of latitude
pub fn north_slope_tile(key: TileKey, base_m: f64, gradient_m_per_deg: f64) -> ElevationTile {
    ElevationTile::from_fn(key, 1201, |lat, _| {
        base_m + (lat - f64::from(key.lat)) * gradient_m_per_deg
    })
    .unwrap()
}
