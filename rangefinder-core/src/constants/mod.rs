//! Constants for the Rangefinder Core
//!
//! Centralized, documented constants for every component. Defaults in
//! [`crate::config`] are built from these values; components read the
//! configuration, never these constants directly, unless the value is a
//! structural limit (window capacities, bin counts).
//!
//! ## Organization
//!
//! - **Sources**: confidence curve knots and accuracy tiers
//! - **Calibration**: sample window, fit bounds, age quality
//! - **Scene**: classifier and bimodal analyzer thresholds
//! - **Terrain**: Earth model, ray march, tile and result caching
//! - **Tracking**: selector thresholds, Kalman, outlier filter, smoother

/// Confidence curve knots and accuracy tiers per source.
pub mod sources;

/// Cross-sensor calibration parameters.
pub mod calibration;

/// Scene classification and bimodal analysis thresholds.
pub mod scene;

/// Terrain ray casting and elevation tile parameters.
pub mod terrain;

/// Selector and tracker parameters.
pub mod tracking;

pub use sources::{NEURAL_DEFAULT_MAX_M, SHORT_RANGE_PRIMARY_MAX_M};
pub use calibration::{MAX_CALIBRATION_SAMPLES, DEFAULT_WINDOW_CAPACITY};
pub use terrain::{EARTH_RADIUS_M, METERS_PER_DEGREE};
pub use tracking::OUTLIER_WINDOW;
