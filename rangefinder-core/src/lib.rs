//! Core fusion engine for Rangefinder
//!
//! Estimates the distance to whatever the device is aimed at by fusing
//! independent range sources whose accuracy depends on distance and scene:
//!
//! | source        | good for            | module        |
//! |---------------|---------------------|---------------|
//! | manual        | operator override   | `objects`     |
//! | short-range   | 0.3 - 8 m           | `pipeline`    |
//! | object size   | 5 - 2000 m          | `objects`     |
//! | terrain ray   | 20 - 5000 m         | `terrain`     |
//! | neural depth  | 2 m - configured cap| `calibration` |
//! | geometric     | 5 - 800 m           | `geometric`   |
//!
//! Each frame the [`fusion::SemanticSourceSelector`] promotes one source by
//! strict priority and scene gating, and the [`fusion::DualHypothesisTracker`]
//! filters a foreground and a background distance independently.
//!
//! ```no_run
//! use std::sync::Arc;
//! use rangefinder_core::config::RangingConfig;
//! use rangefinder_core::pipeline::{FrameInput, FramePipeline, Orientation, RangingContext};
//!
//! let context = RangingContext::new(RangingConfig::default())?;
//! let pipeline = FramePipeline::new(Arc::new(context));
//!
//! let orientation = Orientation { pitch_rad: -0.15, ..Orientation::default() };
//! if let Some(result) = pipeline.process(&FrameInput::new(0, orientation)) {
//!     println!("{:?}: {:.1} m", result.decision, result.foreground.line_of_sight_m);
//! }
//! # Ok::<(), rangefinder_core::errors::RangeError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod buffer;
pub mod calibration;
pub mod confidence;
pub mod config;
pub mod constants;
pub mod errors;
#[cfg(feature = "evaluation")]
pub mod evaluation;
pub mod fusion;
pub mod geometric;
pub mod objects;
pub mod pipeline;
pub mod scene;
pub mod terrain;
pub mod time;
pub mod types;
pub mod validators;

// Public API
pub use calibration::CrossSensorCalibrator;
pub use config::RangingConfig;
pub use errors::{RangeError, RangeResult};
pub use pipeline::{FrameInput, FramePipeline, FrameResult, RangingContext};
pub use types::{DepthReading, RangeOutput, SemanticDecision, SourceTag};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
