//! Dual-hypothesis temporal tracking
//!
//! The foreground answers "how far is what I am aiming at", the background
//! "how far is what lies behind it". Each keeps its own filter chain:
//!
//! ```text
//!  entry ──► OutlierFilter ──► DistanceKalman ──► MotionSmoother ──► RangeOutput
//!            (median swap,      (CV model,          (alpha by motion,
//!             terrain bypass)    Joseph update)      jump confirmation)
//! ```
//!
//! Switching the foreground decision, or the background source, resets the
//! affected chain so history from one source never smears into another.

use log::debug;

use crate::config::TrackerConfig;
use crate::time::Timestamp;
use crate::types::{
    BimodalAnalysis, MotionState, RangeOutput, SemanticDecision, SourceEntry, SourceTag, SourceWeights,
};

use super::kalman::{DistanceKalman, KalmanEstimate};
use super::outlier::{OutlierFilter, OutlierVerdict};
use super::selector::Selection;
use super::smoother::MotionSmoother;

/// Per-frame tracker input
#[derive(Debug, Clone, Copy)]
pub struct TrackerFrame<'a> {
    /// Selector output
    pub selection: &'a Selection,
    /// Bimodal analysis for this frame, if computed
    pub bimodal: Option<&'a BimodalAnalysis>,
    /// Device pitch (rad, negative = down)
    pub pitch_rad: f64,
    /// Device angular speed (rad/s)
    pub angular_velocity_rad_s: f64,
    /// Capture time
    pub timestamp: Timestamp,
}

/// Foreground and background outputs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedRanges {
    /// Primary hypothesis
    pub foreground: RangeOutput,
    /// Background hypothesis
    pub background: RangeOutput,
    /// Outlier outcome for the foreground reading
    pub foreground_verdict: Option<OutlierVerdict>,
}

/// One filter chain
#[derive(Debug, Clone)]
pub struct Hypothesis {
    kalman: DistanceKalman,
    outliers: OutlierFilter,
    smoother: MotionSmoother,
}

impl Hypothesis {
    fn new(config: &TrackerConfig) -> Self {
        Self {
            kalman: DistanceKalman::new(),
            outliers: OutlierFilter::new(config),
            smoother: MotionSmoother::new(config),
        }
    }

    /// Drop all history
    pub fn reset(&mut self) {
        self.kalman.reset();
        self.outliers.clear();
        self.smoother.reset();
    }

    /// Kalman filter state
    pub fn kalman(&self) -> &DistanceKalman {
        &self.kalman
    }

    /// Outlier filter state
    pub fn outliers(&self) -> &OutlierFilter {
        &self.outliers
    }

    fn absorb(
        &mut self,
        entry: &SourceEntry,
        bimodal: bool,
        motion: MotionState,
        timestamp: Timestamp,
    ) -> (f64, KalmanEstimate, OutlierVerdict) {
        let (measured, verdict) = self.outliers.filter(entry.reading.distance_m, entry.source, bimodal);
        if matches!(verdict, OutlierVerdict::Transition | OutlierVerdict::StepAccepted) {
            self.kalman.reset();
            self.smoother.reset();
        }
        let estimate = self.kalman.step(measured, entry.reading.confidence, motion, timestamp);
        let smoothed = self.smoother.smooth(estimate.distance_m, motion);
        (smoothed, estimate, verdict)
    }
}

/// Two independent filter chains plus switch detection
#[derive(Debug, Clone)]
pub struct DualHypothesisTracker {
    foreground: Hypothesis,
    background: Hypothesis,
    previous_decision: SemanticDecision,
    previous_background: Option<SourceTag>,
}

impl Default for DualHypothesisTracker {
    fn default() -> Self {
        Self::new(&TrackerConfig::default())
    }
}

impl DualHypothesisTracker {
    /// Tracker with the given smoothing and outlier policy
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            foreground: Hypothesis::new(config),
            background: Hypothesis::new(config),
            previous_decision: SemanticDecision::None,
            previous_background: None,
        }
    }

    /// Foreground chain
    pub fn foreground(&self) -> &Hypothesis {
        &self.foreground
    }

    /// Background chain
    pub fn background(&self) -> &Hypothesis {
        &self.background
    }

    /// Decision seen on the previous frame
    pub fn previous_decision(&self) -> SemanticDecision {
        self.previous_decision
    }

    /// Forget everything
    pub fn reset(&mut self) {
        self.foreground.reset();
        self.background.reset();
        self.previous_decision = SemanticDecision::None;
        self.previous_background = None;
    }

    /// Filter one frame's selection
    pub fn update(&mut self, frame: &TrackerFrame<'_>) -> TrackedRanges {
        let selection = frame.selection;
        let motion = MotionState::from_angular_velocity(frame.angular_velocity_rad_s);
        let bimodal = frame.bimodal.is_some_and(|b| b.is_bimodal);

        if selection.decision != self.previous_decision {
            debug!(
                "decision {:?} → {:?}; foreground reset",
                self.previous_decision, selection.decision
            );
            self.foreground.reset();
            self.previous_decision = selection.decision;
        }

        let background_source = selection.background.map(|b| b.source);
        if background_source != self.previous_background {
            debug!(
                "background {:?} → {:?}; background reset",
                self.previous_background, background_source
            );
            self.background.reset();
            self.previous_background = background_source;
        }

        let (foreground, foreground_verdict) = match &selection.primary {
            Some(entry) => {
                let (d, _, verdict) = self.foreground.absorb(entry, bimodal, motion, frame.timestamp);
                (output(entry, d, frame, selection.weights), Some(verdict))
            }
            None => (RangeOutput::none(frame.timestamp).with_weights(selection.weights), None),
        };

        let background = match &selection.background {
            Some(entry) => {
                let (d, _, _) = self.background.absorb(entry, bimodal, motion, frame.timestamp);
                output(entry, d, frame, selection.weights)
            }
            None => RangeOutput::none(frame.timestamp).with_weights(selection.weights),
        };

        TrackedRanges {
            foreground,
            background,
            foreground_verdict,
        }
    }
}

fn output(entry: &SourceEntry, distance_m: f64, frame: &TrackerFrame<'_>, weights: SourceWeights) -> RangeOutput {
    RangeOutput::from_distance(
        distance_m,
        entry.weight,
        entry.reading.uncertainty_m,
        frame.pitch_rad,
        Some(entry.source),
        frame.timestamp,
    )
    .with_weights(weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::tracking::INITIAL_DISTANCE_VARIANCE;
    use crate::types::DepthReading;

    fn selection(decision: SemanticDecision, d: f64, bg: Option<(SourceTag, f64)>) -> Selection {
        let primary = decision
            .source()
            .map(|tag| SourceEntry::new(DepthReading::new(tag, d, 0.8, 0), 0.8));
        let background = bg.map(|(tag, d)| SourceEntry::new(DepthReading::new(tag, d, 0.5, 0), 0.5));
        Selection {
            decision,
            primary,
            background,
            background_from_far_cluster: false,
            weights: SourceWeights::default(),
        }
    }

    fn frame(sel: &Selection, ts: Timestamp) -> TrackerFrame<'_> {
        TrackerFrame {
            selection: sel,
            bimodal: None,
            pitch_rad: 0.0,
            angular_velocity_rad_s: 0.0,
            timestamp: ts,
        }
    }

    #[test]
    fn steady_readings_pass_through() {
        let mut tracker = DualHypothesisTracker::default();
        let sel = selection(SemanticDecision::NeuralPrimary, 40.0, None);
        let mut out = tracker.update(&frame(&sel, 0));
        for i in 1..10 {
            out = tracker.update(&frame(&sel, i * 66));
        }
        assert!((out.foreground.line_of_sight_m - 40.0).abs() < 1e-6);
        assert_eq!(out.foreground.primary_source, Some(SourceTag::Neural));
        assert_eq!(out.background.confidence, 0.0);
    }

    #[test]
    fn decision_change_resets_foreground() {
        let mut tracker = DualHypothesisTracker::default();
        let neural = selection(SemanticDecision::NeuralPrimary, 40.0, None);
        for i in 0..5 {
            tracker.update(&frame(&neural, i * 66));
        }
        assert_eq!(tracker.foreground().outliers().len(), 5);
        assert!(tracker.foreground().kalman().covariance()[0][0] < INITIAL_DISTANCE_VARIANCE);

        let geometric = selection(SemanticDecision::GeometricPrimary, 45.0, None);
        let out = tracker.update(&frame(&geometric, 400));
        // The new source starts from scratch: one buffered reading, seeded filter
        assert_eq!(tracker.foreground().outliers().len(), 1);
        assert_eq!(tracker.foreground().kalman().update_count(), 1);
        assert!((out.foreground.line_of_sight_m - 45.0).abs() < 1e-9);
    }

    #[test]
    fn none_decision_outputs_nothing() {
        let mut tracker = DualHypothesisTracker::default();
        let sel = selection(SemanticDecision::None, 0.0, None);
        let out = tracker.update(&frame(&sel, 0));
        assert!(!out.foreground.has_estimate());
        assert_eq!(out.foreground.line_of_sight_m, 0.0);
        assert_eq!(out.foreground.confidence, 0.0);
        assert!(out.foreground_verdict.is_none());
    }

    #[test]
    fn outlier_is_replaced_in_foreground() {
        let mut tracker = DualHypothesisTracker::default();
        let steady = selection(SemanticDecision::NeuralPrimary, 20.0, None);
        for i in 0..4 {
            tracker.update(&frame(&steady, i * 66));
        }
        let spike = selection(SemanticDecision::NeuralPrimary, 45.0, None);
        let out = tracker.update(&frame(&spike, 300));
        assert_eq!(out.foreground_verdict, Some(OutlierVerdict::Replaced { median_m: 20.0 }));
        assert!((out.foreground.line_of_sight_m - 20.0).abs() < 0.5);
    }

    #[test]
    fn terrain_primary_bypasses_outlier_buffer() {
        let mut tracker = DualHypothesisTracker::default();
        let terrain = selection(SemanticDecision::TerrainPrimary, 800.0, None);
        for i in 0..4 {
            tracker.update(&frame(&terrain, i * 500));
        }
        assert!(tracker.foreground().outliers().is_empty());
    }

    #[test]
    fn background_runs_independently() {
        let mut tracker = DualHypothesisTracker::default();
        let sel = selection(SemanticDecision::TerrainPrimary, 600.0, Some((SourceTag::Neural, 90.0)));
        let mut out = tracker.update(&frame(&sel, 0));
        for i in 1..5 {
            out = tracker.update(&frame(&sel, i * 500));
        }
        assert!((out.background.line_of_sight_m - 90.0).abs() < 1e-6);
        assert_eq!(out.background.primary_source, Some(SourceTag::Neural));
        assert_eq!(tracker.background().outliers().len(), 5);

        // Background source change resets only the background chain
        let switched = selection(SemanticDecision::TerrainPrimary, 600.0, Some((SourceTag::Geometric, 70.0)));
        tracker.update(&frame(&switched, 3_000));
        assert_eq!(tracker.background().outliers().len(), 1);
        assert_eq!(tracker.foreground().kalman().update_count(), 6);
    }

    #[test]
    fn slope_correction_uses_pitch() {
        let mut tracker = DualHypothesisTracker::default();
        let sel = selection(SemanticDecision::GeometricPrimary, 100.0, None);
        let mut f = frame(&sel, 0);
        f.pitch_rad = (-60.0f64).to_radians();
        let out = tracker.update(&f);
        assert!((out.foreground.slope_corrected_m - 50.0).abs() < 1e-6);
        assert!((out.foreground.inclination_deg + 60.0).abs() < 1e-9);
    }

    #[test]
    fn hypothesis_reset_drops_all_history() {
        let mut hypothesis = Hypothesis::new(&TrackerConfig::default());
        let entry = SourceEntry::new(DepthReading::new(SourceTag::Neural, 30.0, 0.8, 0), 0.8);
        for i in 0..6 {
            hypothesis.absorb(&entry, false, MotionState::Stationary, i * 66);
        }
        assert_eq!(hypothesis.outliers().len(), 6);
        assert!(hypothesis.kalman().covariance()[0][0] < INITIAL_DISTANCE_VARIANCE);
        assert!(hypothesis.smoother.value().is_some());

        hypothesis.reset();
        assert_eq!(hypothesis.kalman().covariance()[0][0], INITIAL_DISTANCE_VARIANCE);
        assert_eq!(hypothesis.kalman().update_count(), 0);
        assert!(hypothesis.outliers().is_empty());
        assert!(hypothesis.outliers().median().is_none());
        assert!(hypothesis.smoother.value().is_none());
    }
}
