//! Semantic source selection
//!
//! Exactly one source becomes primary each frame, chosen by a fixed priority
//! ladder; the first rung whose condition holds wins:
//!
//! ```text
//!  0  Manual        operator bracket present
//!  1  ShortRange    d < 8 m and w ≥ 0.30
//!  2  ObjectSize    detection at the aim point and w ≥ 0.30
//!  3  Terrain       w ≥ 0.15 and no object at the aim point
//!  4  Neural        below the cap and w ≥ 0.05
//!  5  Geometric     w > 0
//!     None          nothing qualified
//! ```
//!
//! Scene gating runs first: sky removes neural and geometric, a structure at
//! the aim removes geometric and halves terrain. A background entry is then
//! nominated from a different family so the display can show "what is behind".

use log::debug;

use crate::config::{RangingConfig, SelectorConfig};
use crate::confidence::SourceConfidenceModel;
use crate::constants::calibration::EXTRAPOLATION_UNCERTAINTY;
use crate::constants::tracking::{
    BACKGROUND_MIN_WEIGHT, MANUAL_UNCERTAINTY, NEAR_CLUSTER_TOLERANCE, OBJECT_UNCERTAINTY,
    SHORT_RANGE_UNCERTAINTY, STRUCTURE_TERRAIN_FACTOR,
};
use crate::types::{
    BimodalAnalysis, DepthReading, SceneClass, SemanticDecision, SourceEntry, SourceTag, SourceWeights,
};

/// Candidate readings for one frame, at most one per source
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Candidates {
    /// Manual bracket ranging
    pub manual: Option<DepthReading>,
    /// Short-range sensor at the aim point
    pub short_range: Option<DepthReading>,
    /// Object matched at the aim point
    pub object: Option<DepthReading>,
    /// Terrain intersection
    pub terrain: Option<DepthReading>,
    /// Calibrated neural depth at the aim point
    pub neural: Option<DepthReading>,
    /// Ground-plane geometry
    pub geometric: Option<DepthReading>,
}

impl Candidates {
    /// Reading for a source
    pub fn get(&self, tag: SourceTag) -> Option<&DepthReading> {
        match tag {
            SourceTag::Manual => self.manual.as_ref(),
            SourceTag::ShortRange => self.short_range.as_ref(),
            SourceTag::ObjectSize => self.object.as_ref(),
            SourceTag::Terrain => self.terrain.as_ref(),
            SourceTag::Neural => self.neural.as_ref(),
            SourceTag::Geometric => self.geometric.as_ref(),
        }
    }

    /// Store a reading under its own source
    pub fn insert(&mut self, reading: DepthReading) {
        let slot = match reading.source {
            SourceTag::Manual => &mut self.manual,
            SourceTag::ShortRange => &mut self.short_range,
            SourceTag::ObjectSize => &mut self.object,
            SourceTag::Terrain => &mut self.terrain,
            SourceTag::Neural => &mut self.neural,
            SourceTag::Geometric => &mut self.geometric,
        };
        *slot = Some(reading);
    }

    /// Drop the reading for a source, returning it
    pub fn remove(&mut self, tag: SourceTag) -> Option<DepthReading> {
        let slot = match tag {
            SourceTag::Manual => &mut self.manual,
            SourceTag::ShortRange => &mut self.short_range,
            SourceTag::ObjectSize => &mut self.object,
            SourceTag::Terrain => &mut self.terrain,
            SourceTag::Neural => &mut self.neural,
            SourceTag::Geometric => &mut self.geometric,
        };
        slot.take()
    }
}

/// Selector output for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Promoted source
    pub decision: SemanticDecision,
    /// Primary entry, `None` only for [`SemanticDecision::None`]
    pub primary: Option<SourceEntry>,
    /// Background entry from a different family
    pub background: Option<SourceEntry>,
    /// Background came from the far bimodal cluster
    pub background_from_far_cluster: bool,
    /// Gated weight of every source this frame
    pub weights: SourceWeights,
}

/// Fixed relative uncertainty for sources that do not compute their own
pub fn default_uncertainty(tag: SourceTag, distance_m: f64) -> Option<f64> {
    match tag {
        SourceTag::Manual => Some(distance_m * MANUAL_UNCERTAINTY),
        SourceTag::ShortRange => Some(distance_m * SHORT_RANGE_UNCERTAINTY),
        SourceTag::ObjectSize => Some(distance_m * OBJECT_UNCERTAINTY),
        SourceTag::Terrain | SourceTag::Neural | SourceTag::Geometric => None,
    }
}

/// Background preference per primary, best first
pub fn background_preference(decision: SemanticDecision) -> &'static [SourceTag] {
    match decision {
        SemanticDecision::ManualPrimary => &[SourceTag::Terrain, SourceTag::Neural, SourceTag::Geometric],
        SemanticDecision::ShortRangePrimary => &[SourceTag::Neural, SourceTag::Terrain, SourceTag::Geometric],
        SemanticDecision::ObjectPrimary => &[SourceTag::Terrain, SourceTag::Neural, SourceTag::Geometric],
        SemanticDecision::TerrainPrimary => &[SourceTag::Neural, SourceTag::Geometric],
        SemanticDecision::NeuralPrimary => &[SourceTag::Terrain, SourceTag::Geometric],
        SemanticDecision::GeometricPrimary => &[SourceTag::Neural, SourceTag::Terrain],
        SemanticDecision::None => &[],
    }
}

/// Priority state machine over per-source weights
#[derive(Debug, Clone)]
pub struct SemanticSourceSelector {
    config: SelectorConfig,
    model: SourceConfidenceModel,
}

impl SemanticSourceSelector {
    /// Selector for a full ranging configuration
    pub fn new(config: &RangingConfig) -> Self {
        Self {
            config: config.selector.clone(),
            model: SourceConfidenceModel::from_config(&config.sources),
        }
    }

    /// Confidence model used for weighting
    pub fn model(&self) -> &SourceConfidenceModel {
        &self.model
    }

    /// Per-source weights after scene gating
    pub fn gated_weights(&self, candidates: &Candidates, scene: SceneClass) -> SourceWeights {
        let mut weights = SourceWeights::default();
        for tag in SourceTag::ALL {
            let Some(reading) = candidates.get(tag) else {
                continue;
            };
            let mut w = self.model.weight(reading);
            match (scene, tag) {
                (SceneClass::Sky, SourceTag::Neural | SourceTag::Geometric) => w = 0.0,
                (SceneClass::Structure, SourceTag::Geometric) => w = 0.0,
                (SceneClass::Structure, SourceTag::Terrain) => w *= STRUCTURE_TERRAIN_FACTOR,
                _ => {}
            }
            weights.set(tag, w);
        }
        weights
    }

    fn qualifies(&self, tag: SourceTag, reading: &DepthReading, weight: f32, object_at_aim: bool) -> bool {
        if !reading.is_valid() {
            return false;
        }
        match tag {
            SourceTag::Manual => weight > 0.0,
            SourceTag::ShortRange => {
                reading.distance_m < self.config.short_range_max_m && weight >= self.config.short_range_min_weight
            }
            SourceTag::ObjectSize => weight >= self.config.object_min_weight,
            SourceTag::Terrain => !object_at_aim && weight >= self.config.terrain_min_weight,
            SourceTag::Neural => {
                reading.distance_m < self.model.neural_max_m() && weight >= self.config.neural_min_weight
            }
            SourceTag::Geometric => weight > 0.0,
        }
    }

    fn entry(reading: &DepthReading, weight: f32) -> SourceEntry {
        let mut reading = *reading;
        if let Some(u) = default_uncertainty(reading.source, reading.distance_m) {
            reading.uncertainty_m = u;
        }
        SourceEntry::new(reading, weight)
    }

    /// Pick the primary and background entries for a frame
    pub fn select(&self, candidates: &Candidates, scene: SceneClass, bimodal: Option<&BimodalAnalysis>) -> Selection {
        let weights = self.gated_weights(candidates, scene);
        let object_at_aim = candidates.object.is_some_and(|r| r.is_valid());

        let primary = SourceTag::ALL.into_iter().find_map(|tag| {
            let reading = candidates.get(tag)?;
            let w = weights.get(tag);
            self.qualifies(tag, reading, w, object_at_aim)
                .then(|| Self::entry(reading, w))
        });

        let Some(primary) = primary else {
            debug!("no qualifying source (scene {:?})", scene);
            return Selection {
                decision: SemanticDecision::None,
                primary: None,
                background: None,
                background_from_far_cluster: false,
                weights,
            };
        };
        let decision = SemanticDecision::for_source(primary.source);

        let far = bimodal.and_then(|b| self.far_cluster_background(&primary, candidates, &weights, b));
        let background_from_far_cluster = far.is_some();
        let background = far.or_else(|| {
            background_preference(decision).iter().find_map(|tag| {
                let reading = candidates.get(*tag)?;
                let w = weights.get(*tag);
                (reading.is_valid() && w >= BACKGROUND_MIN_WEIGHT).then(|| Self::entry(reading, w))
            })
        });

        debug!(
            "selected {:?} at {:.1} m (w {:.2}), background {:?}",
            decision,
            primary.reading.distance_m,
            primary.weight,
            background.map(|b| b.source)
        );
        Selection {
            decision,
            primary: Some(primary),
            background,
            background_from_far_cluster,
            weights,
        }
    }

    fn far_cluster_background(
        &self,
        primary: &SourceEntry,
        candidates: &Candidates,
        weights: &SourceWeights,
        bimodal: &BimodalAnalysis,
    ) -> Option<SourceEntry> {
        if !bimodal.is_bimodal || bimodal.near_peak_m <= 0.0 || bimodal.far_peak_m <= 0.0 {
            return None;
        }
        let near_gap = (primary.reading.distance_m - bimodal.near_peak_m).abs() / bimodal.near_peak_m;
        if near_gap > NEAR_CLUSTER_TOLERANCE {
            return None;
        }

        if bimodal.terrain_agrees_with_far && primary.source != SourceTag::Terrain {
            if let Some(terrain) = candidates.terrain.filter(|r| r.is_valid()) {
                return Some(Self::entry(&terrain, weights.terrain.max(BACKGROUND_MIN_WEIGHT)));
            }
        }

        // The far peak is itself neural depth
        if primary.source == SourceTag::Neural {
            return None;
        }

        let far = bimodal.far_peak_m;
        let weight = self.model.neural(far).max(BACKGROUND_MIN_WEIGHT);
        let reading = DepthReading::new(SourceTag::Neural, far, weight, primary.reading.timestamp)
            .with_uncertainty(far * EXTRAPOLATION_UNCERTAINTY);
        Some(SourceEntry::new(reading, weight))
    }
}
