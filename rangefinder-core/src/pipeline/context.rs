//! Shared ranging context
//!
//! Everything a frame needs that outlives the frame: the validated
//! configuration, the calibrator (shared with any background ingestion) and the
//! elevation tiles. Passed by `Arc`; there is no global state.
//!
//! The frame path only ever casts against tiles already in memory. Anything
//! that may block on I/O (disk loads, remote point lookups) runs off the frame
//! path and hands its result in through `FrameInput::with_terrain`:
//!
//! ```text
//!  frame thread                          background worker
//!  ────────────                          ─────────────────
//!  cast ──▶ TileCache (memory only)      LayeredElevation ──▶ remote
//!    ▲                                          │
//!    └──── FrameInput::with_terrain ◀───────────┘
//! ```

use std::sync::Arc;

use crate::calibration::CrossSensorCalibrator;
use crate::config::RangingConfig;
use crate::errors::RangeResult;
use crate::terrain::TileCache;

/// Configuration plus long-lived collaborators
pub struct RangingContext {
    config: RangingConfig,
    calibrator: Arc<CrossSensorCalibrator>,
    tiles: Option<Arc<TileCache>>,
}

impl RangingContext {
    /// Validate `config` and build a fresh calibrator for it
    pub fn new(config: RangingConfig) -> RangeResult<Self> {
        config.validate()?;
        let calibrator = Arc::new(CrossSensorCalibrator::new(
            config.calibration.clone(),
            config.sources.neural_max_distance_m,
        ));
        Ok(Self {
            config,
            calibrator,
            tiles: None,
        })
    }

    /// Share an existing calibrator
    pub fn with_calibrator(mut self, calibrator: Arc<CrossSensorCalibrator>) -> Self {
        self.calibrator = calibrator;
        self
    }

    /// Enable in-frame terrain casting against loaded tiles
    ///
    /// The cache may keep filling from a loader thread; frames see whatever is
    /// resident when they cast.
    pub fn with_tiles(mut self, tiles: Arc<TileCache>) -> Self {
        self.tiles = Some(tiles);
        self
    }

    /// Validated configuration
    pub fn config(&self) -> &RangingConfig {
        &self.config
    }

    /// Shared calibrator
    pub fn calibrator(&self) -> &Arc<CrossSensorCalibrator> {
        &self.calibrator
    }

    /// Resident tiles, if in-frame terrain casting is enabled
    pub fn tiles(&self) -> Option<&Arc<TileCache>> {
        self.tiles.as_ref()
    }
}

impl std::fmt::Debug for RangingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangingContext")
            .field("config", &self.config)
            .field("calibrated", &self.calibrator.state().is_calibrated())
            .field("tiles", &self.tiles.as_ref().map(|t| t.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_config() {
        let config = RangingConfig::default().with_neural_max_distance(5.0);
        assert!(RangingContext::new(config).is_err());
    }

    #[test]
    fn shares_calibrator() {
        let a = RangingContext::new(RangingConfig::default()).unwrap();
        let shared = Arc::clone(a.calibrator());
        let b = RangingContext::new(RangingConfig::default())
            .unwrap()
            .with_calibrator(Arc::clone(&shared));
        assert!(Arc::ptr_eq(b.calibrator(), &shared));
        assert!(b.tiles().is_none());
    }
}
