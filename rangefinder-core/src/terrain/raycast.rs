//! Terrain ray intersection
//!
//! A ray leaves the observer along the device heading and pitch and is marched
//! in fixed slant steps matched to the elevation grid. The first step where the
//! ray drops to or below the ground brackets the hit, which bisection then
//! narrows:
//!
//! ```text
//!  alt ▲  observer
//!      │  ●───────╮ ray (pitch < 0)
//!      │          ╰──────╮
//!      │                 ╰──●──╮        ● samples every `step`
//!      │  terrain ▁▁▁▁▁▁▁▂▂▃▄╳▅▆╰─      ╳ sign change of (ray − ground)
//!      └──────────────────────────────► slant
//!                          lo hi  → 5 bisections → |err| ≤ step/64
//! ```
//!
//! Samples are requested in batches so a remote fallback pays its request
//! overhead once per batch rather than once per step.

use log::debug;

use crate::config::TerrainConfig;
use crate::confidence::{altitude_factor, SourceConfidenceModel};
use crate::constants::terrain::{MAX_PITCH_UP_DEG, MIN_PITCH_DEG, MIN_STEP_M};
use crate::time::Timestamp;
use crate::types::{DepthReading, GeoPoint, SourceTag, TerrainRayResult};

use super::geo::{self, EnuDirection};
use super::provider::ElevationSource;

/// Samples requested from the elevation source per batch
const BATCH: usize = 32;

/// Everything a cast needs about the observer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayQuery {
    /// Observer position
    pub observer: GeoPoint,
    /// Heading (deg clockwise from true north)
    pub heading_deg: f64,
    /// Pitch (rad, negative = down)
    pub pitch_rad: f64,
    /// Horizontal GPS accuracy (m)
    pub gps_accuracy_m: f64,
    /// Heading accuracy (deg)
    pub heading_accuracy_deg: f64,
    /// Vertical accuracy (m)
    pub altitude_accuracy_m: f64,
}

impl RayQuery {
    /// Query with perfect accuracy figures
    pub fn new(observer: GeoPoint, heading_deg: f64, pitch_rad: f64) -> Self {
        Self {
            observer,
            heading_deg,
            pitch_rad,
            gps_accuracy_m: 0.0,
            heading_accuracy_deg: 0.0,
            altitude_accuracy_m: 0.0,
        }
    }

    /// Attach accuracy figures
    pub fn with_accuracy(mut self, gps_m: f64, heading_deg: f64, altitude_m: f64) -> Self {
        self.gps_accuracy_m = gps_m;
        self.heading_accuracy_deg = heading_deg;
        self.altitude_accuracy_m = altitude_m;
        self
    }
}

/// Marches rays through an [`ElevationSource`]
#[derive(Debug, Clone)]
pub struct TerrainRayCaster {
    config: TerrainConfig,
    model: SourceConfidenceModel,
}

impl TerrainRayCaster {
    /// Caster with the given search limits and confidence model
    pub fn new(config: TerrainConfig, model: SourceConfidenceModel) -> Self {
        Self { config, model }
    }

    /// Maximum slant distance searched (m)
    pub fn max_search_m(&self) -> f64 {
        self.config.max_search_m
    }

    /// Intersect the query ray with the terrain
    ///
    /// `None` on pitch outside [−90°, +30°], missing elevation, an observer
    /// already at or below ground, or no crossing within the search distance.
    pub fn cast(&self, source: &dyn ElevationSource, query: &RayQuery) -> Option<TerrainRayResult> {
        let pitch_deg = query.pitch_rad.to_degrees();
        if !pitch_deg.is_finite() || !(MIN_PITCH_DEG..=MAX_PITCH_UP_DEG).contains(&pitch_deg) {
            debug!("terrain cast skipped: pitch {:.1}° out of range", pitch_deg);
            return None;
        }

        let observer = query.observer;
        let step = source
            .native_resolution_m(observer.latitude, observer.longitude)?
            .max(MIN_STEP_M);
        let dir = EnuDirection::from_heading_pitch(query.heading_deg, query.pitch_rad);
        let max_s = self.config.max_search_m;

        let clearance = |s: f64, ground: f64| observer.altitude_m + dir.up * s - ground;

        let start = source.elevation_at(observer.latitude, observer.longitude)?;
        let mut prev_s = 0.0;
        let mut prev = clearance(0.0, start);
        if prev <= 0.0 {
            debug!("terrain cast skipped: observer {:.1} m below ground", -prev);
            return None;
        }

        let steps = libm::ceil(max_s / step) as usize;
        let mut i = 1;
        while i <= steps {
            let batch_end = (i + BATCH).min(steps + 1);
            let slants: Vec<f64> = (i..batch_end).map(|k| (k as f64 * step).min(max_s)).collect();
            let points: Vec<(f64, f64)> = slants
                .iter()
                .map(|s| {
                    let p = geo::advance(&observer, &dir, *s);
                    (p.latitude, p.longitude)
                })
                .collect();

            for (s, ground) in slants.iter().zip(source.elevations(&points)) {
                let Some(ground) = ground else {
                    debug!("terrain cast aborted: no elevation at {:.0} m", s);
                    return None;
                };
                let c = clearance(*s, ground);
                if c <= 0.0 {
                    return self.refine(source, query, &dir, prev_s, *s);
                }
                prev_s = *s;
                prev = c;
            }
            i = batch_end;
        }

        debug!(
            "terrain ray missed within {:.0} m (clearance {:.1} m)",
            max_s, prev
        );
        None
    }

    fn refine(
        &self,
        source: &dyn ElevationSource,
        query: &RayQuery,
        dir: &EnuDirection,
        mut lo: f64,
        mut hi: f64,
    ) -> Option<TerrainRayResult> {
        let observer = query.observer;
        for _ in 0..self.config.bisection_iterations {
            let mid = 0.5 * (lo + hi);
            let p = geo::advance(&observer, dir, mid);
            let Some(ground) = source.elevation_at(p.latitude, p.longitude) else {
                break;
            };
            if p.altitude_m - ground > 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        let distance_m = 0.5 * (lo + hi);
        let hit = geo::advance(&observer, dir, distance_m);
        let terrain_elevation_m = source
            .elevation_at(hit.latitude, hit.longitude)
            .unwrap_or(hit.altitude_m);
        let confidence = self.model.terrain(
            distance_m,
            query.gps_accuracy_m,
            query.heading_accuracy_deg,
        ) * altitude_factor(query.altitude_accuracy_m);

        debug!(
            "terrain hit at {:.1} m (ground {:.1} m, conf {:.2})",
            distance_m, terrain_elevation_m, confidence
        );
        Some(TerrainRayResult {
            distance_m,
            terrain_elevation_m,
            confidence: confidence.clamp(0.0, 1.0),
            gps_accuracy_m: query.gps_accuracy_m,
            heading_accuracy_deg: query.heading_accuracy_deg,
            hit,
        })
    }
}

/// One-sigma terrain uncertainty: GPS error plus heading error swept over the range
pub fn terrain_uncertainty(result: &TerrainRayResult) -> f64 {
    let lateral = result.heading_accuracy_deg.to_radians() * result.distance_m;
    libm::sqrt(result.gps_accuracy_m * result.gps_accuracy_m + lateral * lateral)
}

/// Terrain result as a selector reading
pub fn terrain_reading(result: &TerrainRayResult, timestamp: Timestamp) -> DepthReading {
    DepthReading::new(SourceTag::Terrain, result.distance_m, result.confidence, timestamp)
        .with_uncertainty(terrain_uncertainty(result))
}

#[derive(Debug, Clone, Copy)]
struct CachedCast {
    query: RayQuery,
    result: Option<TerrainRayResult>,
    at: Timestamp,
}

/// Rate limiter and reuse cache in front of the caster
///
/// | age            | reuse when                                   |
/// |----------------|----------------------------------------------|
/// | < 500 ms       | always                                       |
/// | < 3 s          | heading, pitch and position barely moved     |
/// | otherwise      | never                                        |
#[derive(Debug, Clone)]
pub struct TerrainRayCache {
    config: TerrainConfig,
    last: Option<CachedCast>,
}

impl TerrainRayCache {
    /// Empty cache using the reuse thresholds in `config`
    pub fn new(config: &TerrainConfig) -> Self {
        Self {
            config: config.clone(),
            last: None,
        }
    }

    /// Cached outcome if it may be reused for `query` at `now`
    ///
    /// The outer `Option` says whether the cache applies; the inner one is the
    /// cached outcome, which may itself be a miss.
    pub fn lookup(&self, query: &RayQuery, now: Timestamp) -> Option<Option<TerrainRayResult>> {
        let cached = self.last.as_ref()?;
        let age = now.saturating_sub(cached.at);
        if age < self.config.min_cast_interval_ms {
            return Some(cached.result);
        }
        if age >= self.config.max_reuse_age_ms {
            return None;
        }

        let dh = geo::heading_delta(cached.query.heading_deg, query.heading_deg).abs();
        let dp = (query.pitch_rad - cached.query.pitch_rad).to_degrees().abs();
        let moved = geo::ground_distance(&cached.query.observer, &query.observer);
        let steady = dh < self.config.negligible_heading_deg
            && dp < self.config.negligible_pitch_deg
            && moved < self.config.negligible_move_m;
        steady.then_some(cached.result)
    }

    /// Remember an outcome
    pub fn store(&mut self, query: &RayQuery, result: Option<TerrainRayResult>, now: Timestamp) {
        self.last = Some(CachedCast {
            query: *query,
            result,
            at: now,
        });
    }

    /// Reuse a cached outcome or cast afresh
    pub fn cast_or_reuse(
        &mut self,
        caster: &TerrainRayCaster,
        source: &dyn ElevationSource,
        query: &RayQuery,
        now: Timestamp,
    ) -> Option<TerrainRayResult> {
        if let Some(result) = self.lookup(query, now) {
            debug!("terrain cache hit");
            return result;
        }
        let result = caster.cast(source, query);
        self.store(query, result, now);
        result
    }

    /// Forget the cached outcome
    pub fn clear(&mut self) {
        self.last = None;
    }
}
