//! Terrain ray casting against tiles loaded from disk and remote fallbacks

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rangefinder_core::confidence::SourceConfidenceModel;
use rangefinder_core::config::TerrainConfig;
use rangefinder_core::terrain::{
    ElevationSource, ElevationTile, LayeredElevation, PointElevationSource, RayQuery, TerrainRayCache,
    TerrainRayCaster, TileCache, TileKey,
};

use common::assert_close;
use common::generators::flat_tile;
use common::scenarios::{observer, GROUND_M, TILE};

/// Flat remote service that counts how many points it was asked for
struct FlatRemote {
    elevation_m: f64,
    queried: AtomicUsize,
}

impl PointElevationSource for FlatRemote {
    fn query(&self, points: &[(f64, f64)]) -> Vec<Option<f64>> {
        self.queried.fetch_add(points.len(), Ordering::SeqCst);
        points.iter().map(|_| Some(self.elevation_m)).collect()
    }
}

fn caster() -> TerrainRayCaster {
    TerrainRayCaster::new(TerrainConfig::default(), SourceConfidenceModel::default())
}

fn query(pitch_deg: f64) -> RayQuery {
    let fix = observer();
    RayQuery::new(fix.point, 0.0, pitch_deg.to_radians()).with_accuracy(3.0, 2.0, 2.0)
}

#[test]
fn hgt_file_round_trip_and_cast() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(TILE.file_name());
    std::fs::write(&path, flat_tile(TILE, GROUND_M).to_hgt_bytes()).unwrap();

    let name = path.file_name().unwrap().to_str().unwrap();
    let key = TileKey::parse(name).unwrap();
    assert_eq!(key, TILE);
    let tile = ElevationTile::from_hgt_bytes(key, &std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(tile.posts(), 1201);
    assert_eq!(tile.void_count(), 0);

    let cache = TileCache::default();
    cache.insert(tile);
    let hit = caster().cast(&cache, &query(-10.0)).unwrap();
    assert_close(hit.distance_m, 40.0 / 10f64.to_radians().sin(), 3.0);
    assert_close(hit.terrain_elevation_m, GROUND_M, 0.5);
    assert!(hit.hit.latitude > observer().point.latitude);
}

#[test]
fn truncated_hgt_is_rejected() {
    let mut bytes = flat_tile(TILE, GROUND_M).to_hgt_bytes();
    bytes.truncate(bytes.len() - 2);
    assert!(ElevationTile::from_hgt_bytes(TILE, &bytes).is_err());
}

#[test]
fn remote_fallback_covers_missing_tiles() {
    let remote = Arc::new(FlatRemote {
        elevation_m: GROUND_M,
        queried: AtomicUsize::new(0),
    });
    let elevation = LayeredElevation::new(Arc::new(TileCache::default())).with_fallback(remote.clone());
    assert_eq!(elevation.native_resolution_m(37.5, -121.5), Some(100.0));

    let hit = caster().cast(&elevation, &query(-10.0)).unwrap();
    assert_close(hit.distance_m, 40.0 / 10f64.to_radians().sin(), 4.0);
    assert!(remote.queried.load(Ordering::SeqCst) > 0);
}

#[test]
fn local_tiles_are_preferred_over_remote() {
    let remote = Arc::new(FlatRemote {
        elevation_m: 0.0,
        queried: AtomicUsize::new(0),
    });
    let tiles = Arc::new(TileCache::default());
    tiles.insert(flat_tile(TILE, GROUND_M));
    let elevation = LayeredElevation::new(tiles).with_fallback(remote.clone());

    let hit = caster().cast(&elevation, &query(-10.0)).unwrap();
    assert_close(hit.terrain_elevation_m, GROUND_M, 0.5);
    assert_eq!(remote.queried.load(Ordering::SeqCst), 0);
}

#[test]
fn no_elevation_means_no_terrain() {
    let cache = TileCache::default();
    assert!(caster().cast(&cache, &query(-10.0)).is_none());
    assert_eq!(
        cache.missing_along_ray(&observer().point, 0.0, 5_000.0),
        vec![TILE]
    );
}

#[test]
fn result_cache_limits_cast_rate() {
    let cache = TileCache::default();
    cache.insert(flat_tile(TILE, GROUND_M));
    let caster = caster();
    let mut results = TerrainRayCache::new(&TerrainConfig::default());

    let first = results.cast_or_reuse(&caster, &cache, &query(-10.0), 1_000).unwrap();
    // Tiles gone, but the fresh result is reused
    cache.clear();
    let reused = results.cast_or_reuse(&caster, &cache, &query(-10.0), 1_200).unwrap();
    assert_eq!(first, reused);
    // A large pitch change after the rate window forces a new cast
    assert!(results.cast_or_reuse(&caster, &cache, &query(-20.0), 1_700).is_none());
}
