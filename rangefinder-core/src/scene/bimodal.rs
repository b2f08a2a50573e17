//! Bimodal depth distribution detection
//!
//! Aiming at a thin foreground object (a branch, a fence post, a person in
//! front of a hillside) yields two depth populations in the central region.
//! Detecting that lets the selector keep the near object as the primary
//! hypothesis and carry the far one as background.
//!
//! ## Algorithm
//!
//! ```text
//! central 30% ─► depth samples ─► 30-bin log histogram ─► 3-bin moving average
//!                                                              │
//!       ┌──────────────────────────────────────────────────────┘
//!       ▼
//!  local maxima ─► two tallest peaks ─► valley between them
//!       │
//!       ├─ each cluster > 10% of samples
//!       ├─ far/near median ratio ≥ 2
//!       └─ valley < 60% of the smaller peak
//! ```
//!
//! Log-scale bins keep a 5 m post and a 400 m hillside from collapsing into
//! the first and last bins of a linear histogram.

use crate::calibration::CrossSensorCalibrator;
use crate::config::BimodalConfig;
use crate::constants::scene::{CENTER_REGION_FRACTION, HISTOGRAM_BINS, MAX_SAMPLES_PER_AXIS};
use crate::types::BimodalAnalysis;

use super::depth_map::{DepthEncoding, DepthMap};

/// Stateless analyzer
#[derive(Debug, Clone)]
pub struct BimodalDepthAnalyzer {
    config: BimodalConfig,
}

impl BimodalDepthAnalyzer {
    /// Analyzer with the given thresholds
    pub fn new(config: BimodalConfig) -> Self {
        Self { config }
    }

    /// Analyze the central region of `map`
    ///
    /// Raw neural maps need a calibrated `calibrator` to report metric peaks;
    /// without one they are reported unimodal.
    pub fn analyze(
        &self,
        map: &DepthMap,
        calibrator: Option<&CrossSensorCalibrator>,
        terrain_m: Option<f64>,
    ) -> BimodalAnalysis {
        let samples = central_samples(map);
        if samples.len() < 10 {
            return BimodalAnalysis::unimodal();
        }

        let Some(split) = self.find_split(&samples) else {
            return BimodalAnalysis::unimodal();
        };

        let (near, far): (Vec<f32>, Vec<f32>) = samples.iter().copied().partition(|d| *d <= split);
        let total = samples.len() as f32;
        let near_fraction = near.len() as f32 / total;
        let far_fraction = far.len() as f32 / total;
        if near_fraction <= self.config.min_cluster_fraction
            || far_fraction <= self.config.min_cluster_fraction
        {
            return BimodalAnalysis::unimodal();
        }

        let (Some(near_rel), Some(far_rel)) = (median(near), median(far)) else {
            return BimodalAnalysis::unimodal();
        };
        if f64::from(far_rel / near_rel) < self.config.min_peak_separation {
            return BimodalAnalysis::unimodal();
        }

        let to_metric = |relative: f32| -> Option<f64> {
            match map.encoding() {
                DepthEncoding::Metric => Some(f64::from(relative)),
                DepthEncoding::InverseRelative => {
                    calibrator.and_then(|c| c.calibrate(1.0 / f64::from(relative)))
                }
            }
        };
        let (Some(near_m), Some(far_m)) = (to_metric(near_rel), to_metric(far_rel)) else {
            return BimodalAnalysis::unimodal();
        };

        let terrain_agrees_with_far = terrain_m
            .filter(|t| *t > 0.0)
            .map(|t| (far_m - t).abs() / t <= self.config.terrain_agreement_tolerance)
            .unwrap_or(false);

        BimodalAnalysis {
            is_bimodal: true,
            near_peak_m: near_m,
            far_peak_m: far_m,
            near_fraction,
            far_fraction,
            terrain_agrees_with_far,
        }
    }

    /// Depth separating the two clusters, if the histogram has a qualifying valley
    fn find_split(&self, samples: &[f32]) -> Option<f32> {
        let (min, max) = samples
            .iter()
            .fold((f32::INFINITY, 0.0f32), |(lo, hi), d| (lo.min(*d), hi.max(*d)));
        let log_min = libm::logf(min);
        let log_max = libm::logf(max);
        let span = log_max - log_min;
        if !(span > 1e-3) {
            return None;
        }

        let mut hist = [0u32; HISTOGRAM_BINS];
        for d in samples {
            let t = (libm::logf(*d) - log_min) / span;
            let bin = ((t * HISTOGRAM_BINS as f32) as usize).min(HISTOGRAM_BINS - 1);
            hist[bin] += 1;
        }

        let smoothed = moving_average(&hist);
        let peaks = local_maxima(&smoothed);
        if peaks.len() < 2 {
            return None;
        }

        // Two tallest, ordered near → far
        let mut tallest: heapless::Vec<usize, HISTOGRAM_BINS> = peaks;
        tallest.sort_unstable_by(|a, b| smoothed[*b].total_cmp(&smoothed[*a]));
        let (mut p1, mut p2) = (tallest[0], tallest[1]);
        if p1 > p2 {
            core::mem::swap(&mut p1, &mut p2);
        }

        let (valley_bin, valley) = (p1..=p2)
            .map(|i| (i, smoothed[i]))
            .min_by(|a, b| a.1.total_cmp(&b.1))?;
        let smaller_peak = smoothed[p1].min(smoothed[p2]);
        if valley >= self.config.max_valley_fraction * smaller_peak {
            return None;
        }

        // Upper edge of the valley bin
        let edge = log_min + span * (valley_bin as f32 + 1.0) / HISTOGRAM_BINS as f32;
        Some(libm::expf(edge))
    }
}

/// Depth-ordered samples from the central region, at most 48 per axis
fn central_samples(map: &DepthMap) -> Vec<f32> {
    let half = CENTER_REGION_FRACTION * 0.5;
    let (x0, y0) = map.pixel_at(0.5 - half, 0.5 - half);
    let (x1, y1) = map.pixel_at(0.5 + half, 0.5 + half);
    let step_x = ((x1 - x0 + 1) / MAX_SAMPLES_PER_AXIS).max(1);
    let step_y = ((y1 - y0 + 1) / MAX_SAMPLES_PER_AXIS).max(1);

    let mut samples = Vec::new();
    for y in (y0..=y1).step_by(step_y) {
        for x in (x0..=x1).step_by(step_x) {
            if let Some(value) = map.get(x, y).filter(|v| map.is_valid_value(*v)) {
                samples.push(map.to_relative(value));
            }
        }
    }
    samples
}

/// Three-bin moving average; edge bins average what exists
fn moving_average(hist: &[u32; HISTOGRAM_BINS]) -> [f32; HISTOGRAM_BINS] {
    let mut out = [0.0f32; HISTOGRAM_BINS];
    for i in 0..HISTOGRAM_BINS {
        let lo = i.saturating_sub(1);
        let hi = (i + 1).min(HISTOGRAM_BINS - 1);
        let sum: u32 = hist[lo..=hi].iter().sum();
        out[i] = sum as f32 / (hi - lo + 1) as f32;
    }
    out
}

/// Bins strictly above the left neighbour and at least the right one
fn local_maxima(smoothed: &[f32; HISTOGRAM_BINS]) -> heapless::Vec<usize, HISTOGRAM_BINS> {
    let mut peaks = heapless::Vec::new();
    for i in 0..HISTOGRAM_BINS {
        let value = smoothed[i];
        if value <= 0.0 {
            continue;
        }
        let left_ok = i == 0 || value > smoothed[i - 1];
        let right_ok = i == HISTOGRAM_BINS - 1 || value >= smoothed[i + 1];
        if left_ok && right_ok {
            let _ = peaks.push(i);
        }
    }
    peaks
}

fn median(mut values: Vec<f32>) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    Some(values[values.len() / 2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BimodalConfig, CalibrationConfig};

    fn analyzer() -> BimodalDepthAnalyzer {
        BimodalDepthAnalyzer::new(BimodalConfig::default())
    }

    /// Post at 10 m covering the left half of the centre, hillside at 60 m behind
    fn post_and_hill() -> DepthMap {
        DepthMap::from_fn(100, 100, DepthEncoding::Metric, |x, y| {
            let jitter = ((x * 7 + y * 3) % 5) as f32 * 0.02;
            if x < 50 { 10.0 + jitter } else { 60.0 + jitter * 5.0 }
        })
        .unwrap()
    }

    #[test]
    fn detects_two_populations() {
        let result = analyzer().analyze(&post_and_hill(), None, None);
        assert!(result.is_bimodal);
        assert!((result.near_peak_m - 10.0).abs() < 0.2);
        assert!((result.far_peak_m - 60.0).abs() < 1.0);
        assert!(result.near_fraction > 0.3 && result.far_fraction > 0.3);
        assert!(!result.terrain_agrees_with_far);
    }

    #[test]
    fn terrain_agreement() {
        let agree = analyzer().analyze(&post_and_hill(), None, Some(70.0));
        assert!(agree.terrain_agrees_with_far);
        let disagree = analyzer().analyze(&post_and_hill(), None, Some(200.0));
        assert!(!disagree.terrain_agrees_with_far);
    }

    #[test]
    fn smooth_gradient_is_unimodal() {
        let map = DepthMap::from_fn(100, 100, DepthEncoding::Metric, |x, _| 20.0 + x as f32 * 0.2).unwrap();
        assert!(!analyzer().analyze(&map, None, None).is_bimodal);
    }

    #[test]
    fn small_cluster_rejected() {
        // Far population covers only a sliver of the centre
        let map = DepthMap::from_fn(100, 100, DepthEncoding::Metric, |x, _| {
            if x > 62 { 80.0 } else { 10.0 }
        })
        .unwrap();
        assert!(!analyzer().analyze(&map, None, None).is_bimodal);
    }

    #[test]
    fn raw_neural_needs_calibration() {
        let map = DepthMap::from_fn(100, 100, DepthEncoding::InverseRelative, |x, _| {
            if x < 50 { 1.2 } else { 0.2 }
        })
        .unwrap();
        assert!(!analyzer().analyze(&map, None, None).is_bimodal);

        let calibrator = CrossSensorCalibrator::new(CalibrationConfig::default(), 150.0);
        for i in 0..10 {
            let gt = 0.5 + 0.7 * i as f64;
            calibrator.add_pair(12.0 / gt, gt, 1.0, i * 50).unwrap();
        }
        let result = analyzer().analyze(&map, Some(&calibrator), None);
        assert!(result.is_bimodal);
        assert!((result.near_peak_m - 10.0).abs() < 1e-3);
        assert!((result.far_peak_m - 60.0).abs() < 1e-3);
    }
}
