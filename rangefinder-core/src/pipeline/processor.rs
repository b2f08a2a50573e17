//! Per-frame ranging pipeline
//!
//! ```text
//!  FrameInput
//!     │
//!     ├─ short-range patch ─────────────┐
//!     ├─ neural patch ── calibrator ────┤
//!     ├─ terrain cast (resident tiles) ─┤
//!     ├─ geometric / object / manual ───┤
//!     │                                 ▼
//!     ├─ scene class ─────────► SemanticSourceSelector
//!     └─ bimodal split ───────►         │
//!                                       ▼
//!                            DualHypothesisTracker ──► FrameResult
//! ```
//!
//! Frames are processed one at a time. A frame that arrives while another is
//! in flight is dropped rather than queued, so the output always reflects the
//! freshest input the device could keep up with.
//!
//! The sensor stage only reads pipeline state. Scene cadence and the terrain
//! cast cache are committed together with the calibrator and tracker, after the
//! last cancellation check, so a cancelled frame leaves no trace.

use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::calibration::CalibrationState;
use crate::confidence::SourceConfidenceModel;
use crate::constants::tracking::SHORT_RANGE_UNCERTAINTY;
use crate::fusion::{Candidates, DualHypothesisTracker, SemanticSourceSelector, TrackerFrame};
use crate::geometric::GeometricRanger;
use crate::objects::ObjectRanger;
use crate::scene::{BimodalDepthAnalyzer, DepthMap, SceneClassifier};
use crate::terrain::{terrain_reading, RayQuery, TerrainRayCache, TerrainRayCaster};
use crate::types::{BimodalAnalysis, DepthReading, SceneClassification, SourceTag, TerrainRayResult};
use crate::validators::{DepthReadingValidator, SampleValidator};

use super::cancel::CancellationToken;
use super::context::RangingContext;
use super::frame::{FrameInput, FrameResult};

/// Mutable per-stream state
#[derive(Debug)]
struct PipelineState {
    classifier: SceneClassifier,
    bimodal: BimodalDepthAnalyzer,
    selector: SemanticSourceSelector,
    tracker: DualHypothesisTracker,
    geometric: GeometricRanger,
    objects: ObjectRanger,
    caster: TerrainRayCaster,
    ray_cache: TerrainRayCache,
    validator: DepthReadingValidator,
}

impl PipelineState {
    fn new(context: &RangingContext) -> Self {
        let config = context.config();
        let model = SourceConfidenceModel::from_config(&config.sources);
        Self {
            classifier: SceneClassifier::new(&config.scene),
            bimodal: BimodalDepthAnalyzer::new(config.bimodal.clone()),
            selector: SemanticSourceSelector::new(config),
            tracker: DualHypothesisTracker::new(&config.tracker),
            geometric: GeometricRanger::new(config.sources.device_height_m, model),
            objects: ObjectRanger::new(config),
            caster: TerrainRayCaster::new(config.terrain.clone(), model),
            ray_cache: TerrainRayCache::new(&config.terrain),
            validator: DepthReadingValidator::new(
                config.sources.neural_max_distance_m,
                config.terrain.max_search_m,
            ),
        }
    }
}

/// Sensor readings gathered before any state is mutated
struct Gathered {
    candidates: Candidates,
    raw_neural: Option<f64>,
    terrain: Option<TerrainRayResult>,
    scene: SceneClassification,
    /// A depth map was classified this frame
    scene_observed: bool,
    bimodal: Option<BimodalAnalysis>,
    /// Fresh cast to remember once the frame commits
    fresh_cast: Option<(RayQuery, Option<TerrainRayResult>)>,
}

/// Sequential frame processor bound to one [`RangingContext`]
pub struct FramePipeline {
    context: Arc<RangingContext>,
    state: Mutex<PipelineState>,
}

impl FramePipeline {
    /// Pipeline with fresh tracking state
    pub fn new(context: Arc<RangingContext>) -> Self {
        let state = Mutex::new(PipelineState::new(&context));
        Self { context, state }
    }

    /// Shared context
    pub fn context(&self) -> &Arc<RangingContext> {
        &self.context
    }

    /// Process one frame
    ///
    /// Returns `None` only when another frame is still being processed.
    pub fn process(&self, input: &FrameInput) -> Option<FrameResult> {
        self.process_cancellable(input, &CancellationToken::new())
    }

    /// Process one frame unless `cancel` fires first
    ///
    /// Cancellation is checked before and after the sensor stage; a cancelled
    /// frame leaves every piece of state untouched and yields `None`.
    pub fn process_cancellable(&self, input: &FrameInput, cancel: &CancellationToken) -> Option<FrameResult> {
        if cancel.is_cancelled() {
            return None;
        }
        let Some(mut state) = self.state.try_lock() else {
            debug!("pipeline busy, dropping frame {}", input.timestamp);
            return None;
        };

        let gathered = self.gather(&state, input);
        if cancel.is_cancelled() {
            debug!("frame {} cancelled", input.timestamp);
            return None;
        }

        if gathered.scene_observed {
            state.classifier.commit(gathered.scene);
        }
        if let Some((query, result)) = &gathered.fresh_cast {
            state.ray_cache.store(query, *result, input.timestamp);
        }

        let calibrator = self.context.calibrator();
        let calibration = match (gathered.raw_neural, gathered.candidates.short_range) {
            (Some(raw), Some(truth)) => {
                match calibrator.add_pair(raw, truth.distance_m, truth.confidence, input.timestamp) {
                    Ok(status) => Some(status),
                    Err(err) => {
                        debug!("calibration sample skipped: {}", err);
                        None
                    }
                }
            }
            _ => None,
        };

        let mut candidates = gathered.candidates;
        if let Some(neural) = gathered
            .raw_neural
            .and_then(|raw| calibrator.neural_reading(raw, input.timestamp))
            .filter(|r| state.validator.is_valid(r))
        {
            candidates.insert(neural);
        }

        let selection = state
            .selector
            .select(&candidates, gathered.scene.class, gathered.bimodal.as_ref());
        let tracked = state.tracker.update(&TrackerFrame {
            selection: &selection,
            bimodal: gathered.bimodal.as_ref(),
            pitch_rad: input.orientation.pitch_rad,
            angular_velocity_rad_s: input.orientation.angular_velocity_rad_s,
            timestamp: input.timestamp,
        });

        debug!(
            "frame {}: {:?} fg {:.1} m bg {:.1} m",
            input.timestamp,
            selection.decision,
            tracked.foreground.line_of_sight_m,
            tracked.background.line_of_sight_m
        );

        Some(FrameResult {
            timestamp: input.timestamp,
            foreground: tracked.foreground,
            background: tracked.background,
            decision: selection.decision,
            weights: selection.weights,
            scene: gathered.scene,
            bimodal: gathered.bimodal,
            terrain_hit: gathered.terrain.map(|t| t.hit),
            calibration,
        })
    }

    /// Clear tracking, scene and terrain caches; the shared calibrator is kept
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.tracker.reset();
        state.classifier.reset();
        state.ray_cache.clear();
    }

    /// Current calibration fit
    pub fn calibration_state(&self) -> CalibrationState {
        self.context.calibrator().state()
    }

    fn gather(&self, state: &PipelineState, input: &FrameInput) -> Gathered {
        let ts = input.timestamp;
        let aim = (input.aim.0 as f32, input.aim.1 as f32);
        let pitch = input.orientation.pitch_rad;
        let mut candidates = Candidates::default();

        if let Some(map) = &input.short_range {
            if let Some(d) = map.center_patch_median(aim.0, aim.1) {
                let d = f64::from(d);
                let reading = DepthReading::new(SourceTag::ShortRange, d, map.center_patch_confidence(aim.0, aim.1), ts)
                    .with_uncertainty(d * SHORT_RANGE_UNCERTAINTY);
                candidates.insert(reading);
            }
        }

        let raw_neural = input
            .neural
            .as_ref()
            .and_then(|map| map.center_patch_median(aim.0, aim.1))
            .map(f64::from)
            .filter(|raw| raw.is_finite() && *raw > 0.0);

        let mut fresh_cast = None;
        let terrain = match input.terrain {
            Some(result) => Some(result),
            None => match self.cast_terrain(state, input) {
                Cast::Reused(result) => result,
                Cast::Fresh(query, result) => {
                    fresh_cast = Some((query, result));
                    result
                }
                Cast::Unavailable => None,
            },
        };
        if let Some(result) = &terrain {
            candidates.insert(terrain_reading(result, ts));
        }

        if let Some(reading) = state.geometric.reading(pitch, ts) {
            candidates.insert(reading);
        }

        if let Some(camera) = &input.camera {
            if let Some(reading) = state.objects.at_aim(camera, &input.detections, input.aim, ts) {
                candidates.insert(reading);
            }
            if let Some(reading) = input.manual.as_ref().and_then(|m| state.objects.manual(camera, m, ts)) {
                candidates.insert(reading);
            }
        }

        for tag in SourceTag::ALL {
            let rejected = candidates.get(tag).is_some_and(|r| !state.validator.is_valid(r));
            if rejected {
                debug!("{} reading outside physical band, dropped", tag.name());
                candidates.remove(tag);
            }
        }

        let scene_map: Option<&DepthMap> = input.neural.as_ref().or(input.short_range.as_ref());
        let scene = match scene_map {
            Some(map) => state.classifier.peek(map, aim, pitch),
            None => SceneClassification::default(),
        };

        let terrain_m = terrain.map(|t| t.distance_m);
        let bimodal = match (&input.neural, &input.short_range) {
            (Some(map), _) => Some(state.bimodal.analyze(map, Some(self.context.calibrator().as_ref()), terrain_m)),
            (None, Some(map)) => Some(state.bimodal.analyze(map, None, terrain_m)),
            (None, None) => None,
        };

        Gathered {
            candidates,
            raw_neural,
            terrain,
            scene,
            scene_observed: scene_map.is_some(),
            bimodal,
            fresh_cast,
        }
    }

    fn cast_terrain(&self, state: &PipelineState, input: &FrameInput) -> Cast {
        let (Some(tiles), Some(fix)) = (self.context.tiles(), input.position) else {
            return Cast::Unavailable;
        };
        let query = RayQuery::new(fix.point, input.orientation.heading_deg, input.orientation.pitch_rad)
            .with_accuracy(
                fix.horizontal_accuracy_m,
                input.orientation.heading_accuracy_deg,
                fix.vertical_accuracy_m,
            );
        if let Some(result) = state.ray_cache.lookup(&query, input.timestamp) {
            debug!("terrain cache hit");
            return Cast::Reused(result);
        }
        let result = state.caster.cast(tiles.as_ref(), &query);
        Cast::Fresh(query, result)
    }
}

/// Outcome of the in-frame terrain stage
enum Cast {
    /// No tiles configured or no position fix
    Unavailable,
    /// Cached outcome still valid
    Reused(Option<TerrainRayResult>),
    /// New cast, not yet stored
    Fresh(RayQuery, Option<TerrainRayResult>),
}

impl std::fmt::Debug for FramePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePipeline")
            .field("context", &self.context)
            .field("busy", &self.state.is_locked())
            .finish()
    }
}
