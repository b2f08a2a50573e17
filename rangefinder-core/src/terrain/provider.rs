//! Elevation sources
//!
//! The ray caster only needs "height of the ground here". Local tiles answer
//! that cheaply; a remote point service answers it slowly and coarsely when no
//! tile covers the area:
//!
//! ```text
//!            ┌─────────────────────┐
//!  caster ──►│ LayeredElevation    │──► TileCache (native post spacing)
//!            │                     │──► fallback  (coarse fixed step)
//!            └─────────────────────┘
//! ```

use std::sync::Arc;

use crate::constants::terrain::FALLBACK_STEP_M;

use super::cache::TileCache;

/// Anything that can report terrain height (m above mean sea level)
pub trait ElevationSource: Send + Sync {
    /// Elevation at a point, `None` when unknown
    fn elevation_at(&self, latitude: f64, longitude: f64) -> Option<f64>;

    /// Natural sampling step around a point, `None` when the point is not covered
    fn native_resolution_m(&self, latitude: f64, longitude: f64) -> Option<f64>;

    /// Elevations for many points; sources with per-request overhead batch this
    fn elevations(&self, points: &[(f64, f64)]) -> Vec<Option<f64>> {
        points
            .iter()
            .map(|(lat, lon)| self.elevation_at(*lat, *lon))
            .collect()
    }
}

impl<T: ElevationSource + ?Sized> ElevationSource for Arc<T> {
    fn elevation_at(&self, latitude: f64, longitude: f64) -> Option<f64> {
        (**self).elevation_at(latitude, longitude)
    }

    fn native_resolution_m(&self, latitude: f64, longitude: f64) -> Option<f64> {
        (**self).native_resolution_m(latitude, longitude)
    }

    fn elevations(&self, points: &[(f64, f64)]) -> Vec<Option<f64>> {
        (**self).elevations(points)
    }
}

/// Remote point-query service used when no tile is available
pub trait PointElevationSource: Send + Sync {
    /// Elevations for a batch of points, in order
    fn query(&self, points: &[(f64, f64)]) -> Vec<Option<f64>>;
}

/// Local tiles first, remote points second
pub struct LayeredElevation {
    tiles: Arc<TileCache>,
    fallback: Option<Arc<dyn PointElevationSource>>,
}

impl LayeredElevation {
    /// Tiles only
    pub fn new(tiles: Arc<TileCache>) -> Self {
        Self {
            tiles,
            fallback: None,
        }
    }

    /// Add a remote fallback
    pub fn with_fallback(mut self, fallback: Arc<dyn PointElevationSource>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Shared tile cache
    pub fn tiles(&self) -> &Arc<TileCache> {
        &self.tiles
    }
}

impl ElevationSource for LayeredElevation {
    fn elevation_at(&self, latitude: f64, longitude: f64) -> Option<f64> {
        self.tiles.elevation_at(latitude, longitude).or_else(|| {
            self.fallback
                .as_ref()
                .and_then(|f| f.query(&[(latitude, longitude)]).into_iter().next().flatten())
        })
    }

    fn native_resolution_m(&self, latitude: f64, longitude: f64) -> Option<f64> {
        self.tiles
            .native_resolution_m(latitude, longitude)
            .or_else(|| self.fallback.as_ref().map(|_| FALLBACK_STEP_M))
    }

    fn elevations(&self, points: &[(f64, f64)]) -> Vec<Option<f64>> {
        let mut out: Vec<Option<f64>> = points
            .iter()
            .map(|(lat, lon)| self.tiles.elevation_at(*lat, *lon))
            .collect();

        let Some(fallback) = &self.fallback else {
            return out;
        };
        let missing: Vec<usize> = (0..out.len()).filter(|i| out[*i].is_none()).collect();
        if missing.is_empty() {
            return out;
        }
        let query: Vec<(f64, f64)> = missing.iter().map(|i| points[*i]).collect();
        for (slot, value) in missing.into_iter().zip(fallback.query(&query)) {
            out[slot] = value;
        }
        out
    }
}
