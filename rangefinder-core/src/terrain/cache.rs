//! Bounded LRU cache of elevation tiles
//!
//! The ray caster reads tiles on the frame path while a background loader
//! inserts freshly decoded ones. A handful of tiles is enough for every ray
//! that stays within a few kilometres of the observer (the 3×3 neighbourhood
//! by default), so the cache is a short vector kept in recency order:
//!
//! ```text
//! least recent                          most recent
//! [ N46E007 | N46E008 | N47E007 | ... | N46E006 ]
//!      ▲ evicted on insert when full        ▲ touched on every hit
//! ```
//!
//! Tiles are handed out as `Arc`s so interpolation never runs under the lock.

use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;

use crate::constants::terrain::DEFAULT_TILE_CACHE_CAPACITY;
use crate::types::GeoPoint;

use super::geo::{self, EnuDirection, TileKey};
use super::provider::ElevationSource;
use super::tile::ElevationTile;

/// Thread-safe LRU tile cache
pub struct TileCache {
    capacity: usize,
    tiles: Mutex<Vec<Arc<ElevationTile>>>,
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_CACHE_CAPACITY)
    }
}

impl TileCache {
    /// Cache holding at most `capacity` tiles
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            tiles: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Maximum number of tiles
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tiles currently held
    pub fn len(&self) -> usize {
        self.tiles.lock().len()
    }

    /// No tiles held
    pub fn is_empty(&self) -> bool {
        self.tiles.lock().is_empty()
    }

    /// Tile is cached (does not touch recency)
    pub fn contains(&self, key: TileKey) -> bool {
        self.tiles.lock().iter().any(|t| t.key() == key)
    }

    /// Keys from least to most recently used
    pub fn keys(&self) -> Vec<TileKey> {
        self.tiles.lock().iter().map(|t| t.key()).collect()
    }

    /// Insert or replace a tile, evicting the least recently used when full
    pub fn insert(&self, tile: ElevationTile) {
        let key = tile.key();
        let mut tiles = self.tiles.lock();
        tiles.retain(|t| t.key() != key);
        if tiles.len() >= self.capacity {
            let evicted = tiles.remove(0);
            debug!("tile cache evicted {}", evicted.key());
        }
        tiles.push(Arc::new(tile));
        info!("tile {} cached ({}/{})", key, tiles.len(), self.capacity);
    }

    /// Fetch a tile and mark it most recently used
    pub fn get(&self, key: TileKey) -> Option<Arc<ElevationTile>> {
        let mut tiles = self.tiles.lock();
        let idx = tiles.iter().position(|t| t.key() == key)?;
        let tile = tiles.remove(idx);
        tiles.push(Arc::clone(&tile));
        Some(tile)
    }

    /// Drop every tile
    pub fn clear(&self) {
        self.tiles.lock().clear();
    }

    /// Tiles a ray from `observer` along `heading_deg` would cross that are not cached
    ///
    /// Sampled every kilometre out to `max_search_m`; the loader uses this to
    /// prefetch before the caster needs them.
    pub fn missing_along_ray(&self, observer: &GeoPoint, heading_deg: f64, max_search_m: f64) -> Vec<TileKey> {
        let dir = EnuDirection::from_heading_pitch(heading_deg, 0.0);
        let mut needed: Vec<TileKey> = Vec::new();
        let mut s: f64 = 0.0;
        loop {
            let p = geo::advance(observer, &dir, s.min(max_search_m));
            let key = TileKey::for_point(p.latitude, p.longitude);
            if !needed.contains(&key) {
                needed.push(key);
            }
            if s >= max_search_m {
                break;
            }
            s += 1000.0;
        }
        needed.retain(|k| !self.contains(*k));
        needed
    }
}

impl ElevationSource for TileCache {
    fn elevation_at(&self, latitude: f64, longitude: f64) -> Option<f64> {
        self.get(TileKey::for_point(latitude, longitude))?
            .elevation_at(latitude, longitude)
    }

    fn native_resolution_m(&self, latitude: f64, longitude: f64) -> Option<f64> {
        self.get(TileKey::for_point(latitude, longitude))
            .map(|tile| tile.resolution_m(latitude))
    }
}
