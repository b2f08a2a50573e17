//! Terrain Ray Casting and Elevation Constants

// ===== EARTH MODEL =====

/// Mean Earth radius used for local ENU ↔ geodetic conversion (m).
///
/// Source: IUGG mean radius R1
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Metres per degree of latitude on the mean sphere.
pub const METERS_PER_DEGREE: f64 = EARTH_RADIUS_M * core::f64::consts::PI / 180.0;

// ===== RAY MARCH =====

/// Maximum slant distance searched for an intersection (m).
pub const DEFAULT_MAX_SEARCH_M: f64 = 5000.0;

/// Bisection iterations after a crossing is bracketed.
pub const BISECTION_ITERATIONS: u32 = 5;

/// Highest accepted pitch above horizontal (deg).
pub const MAX_PITCH_UP_DEG: f64 = 30.0;

/// Lowest accepted pitch (deg, straight down).
pub const MIN_PITCH_DEG: f64 = -90.0;

/// March step used when only the remote point fallback is available (m).
pub const FALLBACK_STEP_M: f64 = 100.0;

/// Smallest march step regardless of tile resolution (m).
pub const MIN_STEP_M: f64 = 5.0;

// ===== TILES =====

/// Default number of tiles held by the LRU cache.
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 9;

/// Void marker in SRTM height files.
pub const HGT_VOID: i16 = -32768;

/// Post count per side of a 1 arc-second SRTM tile.
pub const HGT_POSTS_1_ARCSEC: usize = 3601;

/// Post count per side of a 3 arc-second SRTM tile.
pub const HGT_POSTS_3_ARCSEC: usize = 1201;

// ===== RESULT CACHE =====

/// Minimum interval between casts (ms, ≈ 2 Hz).
pub const MIN_CAST_INTERVAL_MS: u64 = 500;

/// Longest time a result is reused while orientation is steady (ms).
pub const MAX_REUSE_AGE_MS: u64 = 3000;

/// Heading change considered negligible (deg).
pub const NEGLIGIBLE_HEADING_DEG: f64 = 0.5;

/// Pitch change considered negligible (deg).
pub const NEGLIGIBLE_PITCH_DEG: f64 = 0.2;

/// Observer movement considered negligible (m).
pub const NEGLIGIBLE_MOVE_M: f64 = 2.0;
