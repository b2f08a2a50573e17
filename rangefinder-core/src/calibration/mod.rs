//! Cross-Sensor Calibration: Neural Depth → Metric Distance
//!
//! ## Overview
//!
//! Monocular neural depth networks output a relative signal (commonly inverse
//! depth) with an unknown, scene-dependent scale. The short-range depth sensor
//! is metric but only reaches a few metres. Whenever both see the aim point
//! inside the short-range band, their pairing is a free calibration sample:
//!
//! ```text
//!  short-range (metric, 0.3–8 m) ──┐
//!                                   ├──► window ──► WLS fit ──► scale, shift
//!  neural raw (relative, any d) ───┘                              │
//!                                                                 ▼
//!                        neural raw at 60 m ──► calibrate() ──► metric metres
//! ```
//!
//! ## Transform Families
//!
//! | Family  | Model                     | Raw signal        |
//! |---------|---------------------------|-------------------|
//! | Inverse | `d = scale / raw + shift` | inverse-relative  |
//! | Affine  | `d = scale · raw + shift` | relative depth    |
//!
//! The family is detected once from the sign of the Pearson correlation
//! between raw and ground truth (negative ⇒ Inverse) after five samples with
//! |r| ≥ 0.3, unless the configuration forces one.
//!
//! ## Fit Lifecycle
//!
//! 1. Sample validated (band, finiteness, confidence), else dropped
//! 2. Appended to the window (oldest evicted at capacity)
//! 3. Weights `decay^age_s × confidence`, age relative to the newest sample
//! 4. WLS refit; near-singular or implausible fits are rejected and the previous
//!    state is kept
//! 5. `fit_confidence = R² × (0.4 + 0.6 · n / capacity)`
//!
//! ## Extrapolation
//!
//! Ground truth never exceeds ~8 m, yet the transform is applied out to the
//! neural cap. Past the compression knee the output bends toward the cap
//! asymptotically:
//!
//! ```text
//! d' = knee + (cap − knee) · (1 − exp(−(d − knee)/(cap − knee)))
//! ```
//!
//! so a slightly wrong scale cannot run off to kilometres.
//!
//! ## Concurrency
//!
//! All mutable state lives behind one `parking_lot::Mutex`. The calibrator is
//! shared through an `Arc` between the frame pipeline (reads every frame,
//! writes whenever a ground-truth pair exists) and any background ingestion.
//! Readers copy out one [`CalibrationState`] and derive everything from it, so a
//! refit landing mid-read never mixes two fits in one reading.

mod regression;

pub use regression::{pearson, weighted_linear_fit, LinearFit};

use heapless::Deque;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    config::CalibrationConfig,
    constants::calibration::*,
    errors::{RangeError, RangeResult},
    time::{seconds_between, Timestamp},
    types::{DepthReading, SourceTag},
    validators::{CalibrationSampleValidator, SampleValidator},
};

/// Paired short-range ground truth and raw neural output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationSample {
    /// Raw neural value at the aim point
    pub raw_neural: f64,
    /// Metric short-range distance (m)
    pub ground_truth_m: f64,
    /// Short-range confidence in [0, 1]
    pub confidence: f32,
    /// Capture time
    pub timestamp: Timestamp,
}

impl CalibrationSample {
    /// Construct a sample
    pub fn new(raw_neural: f64, ground_truth_m: f64, confidence: f32, timestamp: Timestamp) -> Self {
        Self {
            raw_neural,
            ground_truth_m,
            confidence,
            timestamp,
        }
    }
}

/// Mapping from raw neural output to metres
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransformFamily {
    /// Not yet detected
    #[default]
    Unknown,
    /// `scale · raw + shift`
    Affine,
    /// `scale / raw + shift`
    Inverse,
}

/// Snapshot of the current fit
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationState {
    /// Active family
    pub family: TransformFamily,
    /// Fitted scale
    pub scale: f64,
    /// Fitted shift (m)
    pub shift: f64,
    /// R² weighted by window completeness
    pub fit_confidence: f64,
    /// Samples in the window at the last accepted fit
    pub sample_count: usize,
    /// Time of the last accepted fit
    pub last_update: Option<Timestamp>,
    /// Smallest ground truth in the window at the last fit (m)
    pub min_ground_truth_m: f64,
    /// Largest ground truth in the window at the last fit (m)
    pub max_ground_truth_m: f64,
}

impl Default for CalibrationState {
    fn default() -> Self {
        Self {
            family: TransformFamily::Unknown,
            scale: 1.0,
            shift: 0.0,
            fit_confidence: 0.0,
            sample_count: 0,
            last_update: None,
            min_ground_truth_m: 0.0,
            max_ground_truth_m: 0.0,
        }
    }
}

impl CalibrationState {
    /// A usable fit exists
    pub fn is_calibrated(&self) -> bool {
        self.family != TransformFamily::Unknown && self.last_update.is_some()
    }

    /// Distance inside the ground truth this fit was made from
    pub fn covers(&self, distance_m: f64) -> bool {
        self.is_calibrated() && distance_m >= self.min_ground_truth_m && distance_m <= self.max_ground_truth_m
    }

    /// Age quality of this fit at `now`; zero before the first fit
    pub fn age_quality(&self, now: Timestamp) -> f64 {
        self.last_update
            .map_or(0.0, |updated| age_quality(seconds_between(updated, now)))
    }
}

/// What happened to an accepted sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStatus {
    /// Stored; not enough samples (or no family) to fit yet
    Collecting,
    /// New fit accepted
    Updated,
    /// Fit rejected, previous state retained
    Rejected,
}

struct CalibratorInner {
    window: Deque<CalibrationSample, MAX_CALIBRATION_SAMPLES>,
    state: CalibrationState,
}

/// Rolling, self-updating neural depth calibrator
pub struct CrossSensorCalibrator {
    config: CalibrationConfig,
    validator: CalibrationSampleValidator,
    neural_max_m: f64,
    inner: Mutex<CalibratorInner>,
}

impl CrossSensorCalibrator {
    /// Calibrator with the given configuration and neural hard cap
    pub fn new(config: CalibrationConfig, neural_max_m: f64) -> Self {
        let mut state = CalibrationState::default();
        if let Some(family) = config.forced_family {
            state.family = family;
        }
        Self {
            validator: CalibrationSampleValidator::from_config(&config),
            config,
            neural_max_m,
            inner: Mutex::new(CalibratorInner {
                window: Deque::new(),
                state,
            }),
        }
    }

    fn capacity(&self) -> usize {
        self.config.window_capacity.clamp(1, MAX_CALIBRATION_SAMPLES)
    }

    /// Offer a ground-truth pairing
    ///
    /// Invalid samples return `InvalidSample` and leave the window untouched.
    pub fn add_sample(&self, sample: CalibrationSample) -> RangeResult<FitStatus> {
        if let Err(err) = self.validator.validate(&sample) {
            debug!("calibration sample dropped: {}", err);
            return Err(err);
        }

        let mut inner = self.inner.lock();
        if inner.window.len() >= self.capacity() {
            inner.window.pop_front();
        }
        // Capacity was checked above
        let _ = inner.window.push_back(sample);

        let n = inner.window.len();
        if inner.state.family == TransformFamily::Unknown {
            match self.detect_family(&inner.window) {
                Some(family) => {
                    info!("calibration family detected: {:?} after {} samples", family, n);
                    inner.state.family = family;
                }
                None => return Ok(FitStatus::Collecting),
            }
        }

        if n < MIN_FIT_SAMPLES {
            return Ok(FitStatus::Collecting);
        }

        match self.fit(&inner.window, inner.state.family, sample.timestamp) {
            Ok(state) => {
                debug!(
                    "calibration refit: scale={:.4} shift={:.3} conf={:.3} n={}",
                    state.scale, state.shift, state.fit_confidence, state.sample_count
                );
                inner.state = state;
                Ok(FitStatus::Updated)
            }
            Err(err) => {
                warn!("calibration fit rejected, keeping previous: {}", err);
                Ok(FitStatus::Rejected)
            }
        }
    }

    /// Convenience form of [`add_sample`](Self::add_sample)
    pub fn add_pair(
        &self,
        raw_neural: f64,
        ground_truth_m: f64,
        confidence: f32,
        timestamp: Timestamp,
    ) -> RangeResult<FitStatus> {
        self.add_sample(CalibrationSample::new(raw_neural, ground_truth_m, confidence, timestamp))
    }

    fn detect_family(
        &self,
        window: &Deque<CalibrationSample, MAX_CALIBRATION_SAMPLES>,
    ) -> Option<TransformFamily> {
        if window.len() < FAMILY_DETECTION_MIN_SAMPLES {
            return None;
        }
        let pairs: heapless::Vec<(f64, f64), MAX_CALIBRATION_SAMPLES> = window
            .iter()
            .map(|s| (s.raw_neural, s.ground_truth_m))
            .collect();
        let r = pearson(&pairs)?;
        if r.abs() < FAMILY_DETECTION_MIN_CORRELATION {
            return None;
        }
        Some(if r < 0.0 { TransformFamily::Inverse } else { TransformFamily::Affine })
    }

    fn fit(
        &self,
        window: &Deque<CalibrationSample, MAX_CALIBRATION_SAMPLES>,
        family: TransformFamily,
        now: Timestamp,
    ) -> RangeResult<CalibrationState> {
        let decay = self.config.decay_per_second;
        let mut points: heapless::Vec<(f64, f64, f64), MAX_CALIBRATION_SAMPLES> = heapless::Vec::new();
        let mut min_gt = f64::INFINITY;
        let mut max_gt = 0.0f64;

        for s in window.iter() {
            let x = match family {
                TransformFamily::Inverse => 1.0 / s.raw_neural,
                TransformFamily::Affine => s.raw_neural,
                TransformFamily::Unknown => {
                    return Err(RangeError::FitRejected { reason: "no transform family" })
                }
            };
            let age = seconds_between(s.timestamp, now);
            let weight = libm::pow(decay, age) * f64::from(s.confidence);
            let _ = points.push((x, s.ground_truth_m, weight));
            min_gt = min_gt.min(s.ground_truth_m);
            max_gt = max_gt.max(s.ground_truth_m);
        }

        let line = weighted_linear_fit(&points)?;
        check_plausible(line.slope, line.intercept)?;

        let n = window.len();
        let completeness = COMPLETENESS_BASE + COMPLETENESS_GAIN * (n as f64 / self.capacity() as f64).min(1.0);

        Ok(CalibrationState {
            family,
            scale: line.slope,
            shift: line.intercept,
            fit_confidence: (line.r_squared * completeness).clamp(0.0, 1.0),
            sample_count: n,
            last_update: Some(now),
            min_ground_truth_m: min_gt,
            max_ground_truth_m: max_gt,
        })
    }

    /// Current fit
    pub fn state(&self) -> CalibrationState {
        self.inner.lock().state
    }

    /// Samples currently held
    pub fn sample_count(&self) -> usize {
        self.inner.lock().window.len()
    }

    /// Drop every sample and the fit (forced family survives)
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.window.clear();
        inner.state = CalibrationState::default();
        if let Some(family) = self.config.forced_family {
            inner.state.family = family;
        }
    }

    /// Knee actually used; never closer to the cap than 80% of it
    fn effective_knee(&self) -> f64 {
        self.config.compression_knee_m.min(0.8 * self.neural_max_m)
    }

    /// Convert a raw neural value to metres
    ///
    /// `None` before the first accepted fit or when the transform yields a
    /// non-positive distance.
    pub fn calibrate(&self, raw: f64) -> Option<f64> {
        self.calibrate_with(&self.state(), raw)
    }

    /// [`calibrate`](Self::calibrate) against a given snapshot
    pub fn calibrate_with(&self, state: &CalibrationState, raw: f64) -> Option<f64> {
        if !state.is_calibrated() || !raw.is_finite() || raw <= 0.0 {
            return None;
        }
        let linear = match state.family {
            TransformFamily::Inverse => state.scale / raw + state.shift,
            TransformFamily::Affine => state.scale * raw + state.shift,
            TransformFamily::Unknown => return None,
        };
        if !linear.is_finite() || linear <= 0.0 {
            return None;
        }
        Some(soft_compress(linear, self.effective_knee(), self.neural_max_m))
    }

    /// Map a calibrated distance back to the raw neural value
    pub fn invert(&self, distance_m: f64) -> Option<f64> {
        let state = self.state();
        if !state.is_calibrated() || !distance_m.is_finite() || distance_m <= 0.0 {
            return None;
        }
        let linear = soft_expand(distance_m, self.effective_knee(), self.neural_max_m)?;
        let raw = match state.family {
            TransformFamily::Inverse => {
                let denom = linear - state.shift;
                if denom <= 0.0 {
                    return None;
                }
                state.scale / denom
            }
            TransformFamily::Affine => (linear - state.shift) / state.scale,
            TransformFamily::Unknown => return None,
        };
        (raw.is_finite() && raw > 0.0).then_some(raw)
    }

    /// Trust in the fit given its age: 1.0 for 45 s, then linear to 0.4 at 300 s
    pub fn age_quality(&self, now: Timestamp) -> f64 {
        self.state().age_quality(now)
    }

    /// Distance inside the ground-truth range of the current fit
    pub fn in_calibrated_range(&self, distance_m: f64) -> bool {
        self.state().covers(distance_m)
    }

    /// Calibrated neural reading for the selector
    ///
    /// Confidence is fit confidence × age quality; uncertainty is 5% inside the
    /// ground-truth range and 15% in the extrapolation zone. Every figure comes
    /// from one snapshot of the fit, even while another thread is ingesting.
    pub fn neural_reading(&self, raw: f64, now: Timestamp) -> Option<DepthReading> {
        self.neural_reading_with(&self.state(), raw, now)
    }

    /// [`neural_reading`](Self::neural_reading) against a given snapshot
    pub fn neural_reading_with(&self, state: &CalibrationState, raw: f64, now: Timestamp) -> Option<DepthReading> {
        let distance = self.calibrate_with(state, raw)?;
        let confidence = (state.fit_confidence * state.age_quality(now)) as f32;
        let relative = if state.covers(distance) {
            IN_RANGE_UNCERTAINTY
        } else {
            EXTRAPOLATION_UNCERTAINTY
        };
        Some(
            DepthReading::new(SourceTag::Neural, distance, confidence, now)
                .with_uncertainty(distance * relative),
        )
    }
}

/// Age quality curve (seconds since the last fit)
pub fn age_quality(age_s: f64) -> f64 {
    if age_s <= AGE_FULL_TRUST_S {
        1.0
    } else if age_s >= AGE_FLOOR_S {
        AGE_QUALITY_FLOOR
    } else {
        let t = (age_s - AGE_FULL_TRUST_S) / (AGE_FLOOR_S - AGE_FULL_TRUST_S);
        1.0 - (1.0 - AGE_QUALITY_FLOOR) * t
    }
}

fn check_plausible(scale: f64, shift: f64) -> RangeResult<()> {
    if !scale.is_finite() || !(SCALE_MIN..=SCALE_MAX).contains(&scale) {
        return Err(RangeError::FitRejected { reason: "scale outside plausibility bounds" });
    }
    if !shift.is_finite() || shift.abs() > SHIFT_MAX_ABS {
        return Err(RangeError::FitRejected { reason: "shift outside plausibility bounds" });
    }
    Ok(())
}

/// Exponential soft compression toward `cap` beyond `knee`
pub fn soft_compress(distance: f64, knee: f64, cap: f64) -> f64 {
    if distance <= knee || cap <= knee {
        return distance.min(cap.max(knee));
    }
    let span = cap - knee;
    knee + span * (1.0 - libm::exp(-(distance - knee) / span))
}

/// Inverse of [`soft_compress`]; `None` at or beyond the cap
pub fn soft_expand(distance: f64, knee: f64, cap: f64) -> Option<f64> {
    if distance <= knee || cap <= knee {
        return Some(distance);
    }
    if distance >= cap {
        return None;
    }
    let span = cap - knee;
    Some(knee - span * libm::log(1.0 - (distance - knee) / span))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calibrator() -> CrossSensorCalibrator {
        CrossSensorCalibrator::new(CalibrationConfig::default(), 150.0)
    }

    /// gt = 12 / raw + 0.3
    fn feed_inverse(cal: &CrossSensorCalibrator, count: usize) {
        for i in 0..count {
            let gt = 0.5 + 7.0 * (i as f64) / (count.max(2) - 1) as f64;
            let raw = 12.0 / (gt - 0.3);
            cal.add_pair(raw, gt, 0.9, 1_000 + i as u64 * 100).unwrap();
        }
    }

    #[test]
    fn recovers_inverse_transform() {
        let cal = calibrator();
        feed_inverse(&cal, 12);

        let state = cal.state();
        assert_eq!(state.family, TransformFamily::Inverse);
        assert!((state.scale - 12.0).abs() < 1e-6);
        assert!((state.shift - 0.3).abs() < 1e-6);
        assert!((cal.calibrate(12.0 / 4.7).unwrap() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn fit_confidence_grows_with_samples() {
        let few = calibrator();
        feed_inverse(&few, 6);
        let many = calibrator();
        feed_inverse(&many, 30);
        assert!(many.state().fit_confidence > few.state().fit_confidence);
    }

    #[test]
    fn collecting_until_family_known() {
        let cal = calibrator();
        for i in 0..4 {
            let gt = 1.0 + i as f64;
            let status = cal.add_pair(12.0 / gt, gt, 0.9, i * 10).unwrap();
            assert_eq!(status, FitStatus::Collecting);
        }
        assert!(!cal.state().is_calibrated());
        assert!(cal.calibrate(3.0).is_none());
    }

    #[test]
    fn affine_family_detected() {
        let cal = calibrator();
        for i in 0..8 {
            let raw = 0.1 + 0.1 * i as f64;
            cal.add_pair(raw, 10.0 * raw - 0.5, 1.0, i * 100).unwrap();
        }
        let state = cal.state();
        assert_eq!(state.family, TransformFamily::Affine);
        assert!((state.scale - 10.0).abs() < 1e-6);
    }

    #[test]
    fn invalid_samples_leave_window_untouched() {
        let cal = calibrator();
        assert!(cal.add_pair(1.0, 12.0, 0.9, 0).is_err());
        assert!(cal.add_pair(f64::NAN, 2.0, 0.9, 0).is_err());
        assert!(cal.add_pair(-1.0, 2.0, 0.9, 0).is_err());
        assert_eq!(cal.sample_count(), 0);
    }

    #[test]
    fn implausible_fit_keeps_previous() {
        let cal = calibrator();
        feed_inverse(&cal, 10);
        let before = cal.state();

        // Identical raw value for wildly different ground truth: the slope
        // explodes once these dominate the window
        let mut rejected = false;
        for i in 0..60 {
            let gt = if i % 2 == 0 { 0.5 } else { 7.5 };
            if cal.add_pair(1e-4, gt, 1.0, 100_000 + i * 10).unwrap() == FitStatus::Rejected {
                rejected = true;
            }
        }
        assert!(rejected);
        let after = cal.state();
        assert!(after.scale <= SCALE_MAX);
        assert!(after.shift.abs() <= SHIFT_MAX_ABS);
        assert!(after.last_update >= before.last_update);
    }

    #[test]
    fn window_is_capped() {
        let cal = calibrator();
        feed_inverse(&cal, 80);
        assert_eq!(cal.sample_count(), CalibrationConfig::default().window_capacity);
    }

    #[test]
    fn round_trip_inverse_family() {
        let cal = calibrator();
        feed_inverse(&cal, 12);
        for raw in [8.0, 2.0, 0.5, 0.2, 0.1] {
            let d = cal.calibrate(raw).unwrap();
            let back = cal.invert(d).unwrap();
            assert!((back - raw).abs() / raw < 1e-6, "raw {} → {} → {}", raw, d, back);
        }
    }

    #[test]
    fn compression_bounds_output_below_cap() {
        let cal = calibrator();
        feed_inverse(&cal, 12);
        // Linear transform would give 12/0.01 + 0.3 = 1200 m
        let d = cal.calibrate(0.01).unwrap();
        assert!(d > 80.0 && d < 150.0);
        assert!(cal.invert(150.0).is_none());
    }

    #[test]
    fn soft_compress_is_continuous_at_knee() {
        assert_eq!(soft_compress(80.0, 80.0, 150.0), 80.0);
        let just_past = soft_compress(80.001, 80.0, 150.0);
        assert!((just_past - 80.001).abs() < 1e-5);
    }

    #[test]
    fn age_quality_curve() {
        assert_eq!(age_quality(0.0), 1.0);
        assert_eq!(age_quality(45.0), 1.0);
        assert!((age_quality(172.5) - 0.7).abs() < 1e-9);
        assert_eq!(age_quality(300.0), 0.4);
        assert_eq!(age_quality(3600.0), 0.4);
    }

    #[test]
    fn neural_reading_uncertainty_zones() {
        let cal = calibrator();
        feed_inverse(&cal, 12);
        let now = 3_000;

        let inside = cal.neural_reading(12.0 / 4.7, now).unwrap();
        assert!((inside.uncertainty_m / inside.distance_m - 0.05).abs() < 1e-9);

        let outside = cal.neural_reading(12.0 / 39.7, now).unwrap();
        assert!((outside.uncertainty_m / outside.distance_m - 0.15).abs() < 1e-9);
        assert!(outside.confidence > 0.0);
    }

    #[test]
    fn forced_family_skips_detection() {
        let config = CalibrationConfig {
            forced_family: Some(TransformFamily::Inverse),
            ..CalibrationConfig::default()
        };
        let cal = CrossSensorCalibrator::new(config, 150.0);
        assert_eq!(cal.state().family, TransformFamily::Inverse);
        cal.reset();
        assert_eq!(cal.state().family, TransformFamily::Inverse);
    }

    #[test]
    fn readings_never_mix_fits_under_concurrent_ingest() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::thread;

        let cal = calibrator();
        let done = AtomicBool::new(false);
        let now = 1_000_000;
        let raws = [10.0 / 4.0, 10.0 / 20.0, 10.0 / 7.0];

        let (published, readings) = thread::scope(|scope| {
            let writer = scope.spawn(|| {
                let mut published = vec![cal.state()];
                // Scale and ground-truth span drift so consecutive fits differ
                for i in 0..400u64 {
                    let scale = if (i / 25) % 2 == 0 { 10.0 } else { 13.0 };
                    let gt = 0.5 + (i % 17) as f64 * 0.2 + (i / 50) as f64 * 0.1;
                    let _ = cal.add_pair(scale / gt, gt, 0.9, 1_000 + i * 50);
                    published.push(cal.state());
                }
                done.store(true, Ordering::Release);
                published
            });
            let reader = scope.spawn(|| {
                let mut readings = Vec::new();
                let mut seen = [None; 3];
                let mut i = 0;
                while !done.load(Ordering::Acquire) {
                    let k = i % raws.len();
                    let reading = cal.neural_reading(raws[k], now);
                    if let Some(r) = reading.filter(|_| reading != seen[k]) {
                        readings.push((raws[k], r));
                    }
                    seen[k] = reading;
                    i += 1;
                }
                readings
            });
            (writer.join().unwrap(), reader.join().unwrap())
        });

        for (raw, reading) in readings {
            let consistent = published
                .iter()
                .any(|state| cal.neural_reading_with(state, raw, now) == Some(reading));
            assert!(consistent, "reading {:?} matches no single fit", reading);
        }
        // Afterwards a plain read agrees with the final snapshot
        let last = published.last().copied().unwrap();
        assert_eq!(cal.neural_reading(raws[0], now), cal.neural_reading_with(&last, raws[0], now));
        assert_eq!(cal.in_calibrated_range(4.0), last.covers(4.0));
        assert_eq!(cal.age_quality(now), last.age_quality(now));
    }
}
