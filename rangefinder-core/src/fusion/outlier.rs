//! Median-based outlier rejection
//!
//! Each hypothesis remembers the last few accepted distances. Once enough
//! history exists, a reading that strays from their median by more than a
//! distance-dependent fraction is swapped for the median:
//!
//! | median      | allowed deviation |
//! |-------------|-------------------|
//! | < 20 m      | 40 %              |
//! | < 50 m      | 35 %              |
//! | ≤ 100 m     | 30 %              |
//! | beyond      | 25 %              |
//!
//! Two escapes keep the filter from locking onto stale history: a large jump
//! while the depth distribution is bimodal is a switch between clusters, and a
//! run of rejections that agree with each other is a real change of target.

use heapless::Vec as FixedVec;
use log::debug;

use crate::buffer::CircularBuffer;
use crate::config::TrackerConfig;
use crate::constants::tracking::{OUTLIER_FAR_THRESHOLD, OUTLIER_MIN_HISTORY, OUTLIER_TIERS, OUTLIER_WINDOW};
use crate::types::SourceTag;

/// Most rejections remembered while waiting for a confirmed step
const MAX_STREAK: usize = 8;

/// What the filter did with a reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutlierVerdict {
    /// Within tolerance (or not enough history yet) and buffered
    Accepted,
    /// Rejected; the median was substituted
    Replaced {
        /// Median returned in place of the reading
        median_m: f64,
    },
    /// Bimodal cluster switch; history restarted from this reading
    Transition,
    /// Consistent rejections accepted as a genuine change
    StepAccepted,
    /// Source is exempt; neither checked nor buffered
    Bypassed,
}

/// Allowed relative deviation from a median distance
pub fn deviation_threshold(median_m: f64) -> f64 {
    let last = OUTLIER_TIERS.len().saturating_sub(1);
    OUTLIER_TIERS
        .iter()
        .enumerate()
        .find(|(i, (limit, _))| median_m < *limit || (*i == last && median_m <= *limit))
        .map_or(OUTLIER_FAR_THRESHOLD, |(_, (_, t))| *t)
}

fn relative_deviation(value: f64, reference: f64) -> f64 {
    if reference <= 0.0 {
        return f64::INFINITY;
    }
    (value - reference).abs() / reference
}

/// Rolling median outlier filter for one hypothesis
#[derive(Debug, Clone)]
pub struct OutlierFilter {
    history: CircularBuffer<f64, OUTLIER_WINDOW>,
    streak: FixedVec<f64, MAX_STREAK>,
    max_consecutive: usize,
    transition_ratio: f64,
}

impl Default for OutlierFilter {
    fn default() -> Self {
        Self::new(&TrackerConfig::default())
    }
}

impl OutlierFilter {
    /// Empty filter using the tracker's step and transition policy
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            history: CircularBuffer::new(),
            streak: FixedVec::new(),
            max_consecutive: (config.max_consecutive_rejections as usize).clamp(1, MAX_STREAK),
            transition_ratio: config.bimodal_transition_ratio,
        }
    }

    /// Distances currently buffered
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Nothing buffered
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Median of the buffered distances
    pub fn median(&self) -> Option<f64> {
        self.history.median()
    }

    /// Forget all history
    pub fn clear(&mut self) {
        self.history.clear();
        self.streak.clear();
    }

    fn restart_from(&mut self, distance_m: f64) {
        self.clear();
        self.history.push(distance_m);
    }

    /// Check a reading, returning the distance to use and what happened
    pub fn filter(&mut self, distance_m: f64, source: SourceTag, bimodal: bool) -> (f64, OutlierVerdict) {
        if source == SourceTag::Terrain {
            return (distance_m, OutlierVerdict::Bypassed);
        }

        let median = match self.history.median() {
            Some(m) if self.history.len() >= OUTLIER_MIN_HISTORY => m,
            _ => {
                self.streak.clear();
                self.history.push(distance_m);
                return (distance_m, OutlierVerdict::Accepted);
            }
        };

        let ratio = if median > 0.0 { distance_m / median } else { f64::INFINITY };
        if bimodal && (ratio > self.transition_ratio || ratio < 1.0 / self.transition_ratio) {
            debug!("bimodal transition {:.1} → {:.1} m", median, distance_m);
            self.restart_from(distance_m);
            return (distance_m, OutlierVerdict::Transition);
        }

        if relative_deviation(distance_m, median) <= deviation_threshold(median) {
            self.streak.clear();
            self.history.push(distance_m);
            return (distance_m, OutlierVerdict::Accepted);
        }

        if !self.extends_streak(distance_m) {
            self.streak.clear();
        }
        // Capacity is at least `max_consecutive`, which resets the streak before overflow
        let _ = self.streak.push(distance_m);

        if self.streak.len() >= self.max_consecutive {
            debug!(
                "{} consistent rejections near {:.1} m accepted as a step",
                self.streak.len(),
                distance_m
            );
            self.restart_from(distance_m);
            return (distance_m, OutlierVerdict::StepAccepted);
        }

        debug!("outlier {:.1} m replaced by median {:.1} m", distance_m, median);
        (median, OutlierVerdict::Replaced { median_m: median })
    }

    fn extends_streak(&self, distance_m: f64) -> bool {
        if self.streak.is_empty() {
            return true;
        }
        let mut values: FixedVec<f64, MAX_STREAK> = self.streak.clone();
        let _ = values.push(distance_m);
        values.sort_unstable_by(|a, b| a.total_cmp(b));
        let mid = values[values.len() / 2];
        let threshold = deviation_threshold(mid);
        values.iter().all(|v| relative_deviation(*v, mid) <= threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primed(values: &[f64]) -> OutlierFilter {
        let mut f = OutlierFilter::default();
        for v in values {
            f.filter(*v, SourceTag::Neural, false);
        }
        f
    }

    #[test]
    fn thresholds_by_distance() {
        assert_eq!(deviation_threshold(10.0), 0.40);
        assert_eq!(deviation_threshold(20.0), 0.35);
        assert_eq!(deviation_threshold(49.9), 0.35);
        assert_eq!(deviation_threshold(100.0), 0.30);
        assert_eq!(deviation_threshold(100.1), 0.25);
    }

    #[test]
    fn replaces_outlier_at_20m() {
        let mut f = primed(&[20.0, 20.5, 19.5]);
        let (d, verdict) = f.filter(40.0, SourceTag::Neural, false);
        assert_eq!(d, 20.0);
        assert_eq!(verdict, OutlierVerdict::Replaced { median_m: 20.0 });
        // Replacements are not buffered
        assert_eq!(f.len(), 3);
    }

    #[test]
    fn accepts_within_tolerance() {
        let mut f = primed(&[20.0, 20.5, 19.5]);
        let (d, verdict) = f.filter(25.0, SourceTag::Neural, false);
        assert_eq!(d, 25.0);
        assert_eq!(verdict, OutlierVerdict::Accepted);
        assert_eq!(f.len(), 4);
    }

    #[test]
    fn terrain_bypasses_and_is_not_buffered() {
        let mut f = primed(&[20.0, 20.0, 20.0]);
        let (d, verdict) = f.filter(900.0, SourceTag::Terrain, false);
        assert_eq!(d, 900.0);
        assert_eq!(verdict, OutlierVerdict::Bypassed);
        assert_eq!(f.len(), 3);
    }

    #[test]
    fn bimodal_transition_clears_history() {
        let mut f = primed(&[20.0, 20.0, 20.0, 20.0]);
        let (d, verdict) = f.filter(90.0, SourceTag::Neural, true);
        assert_eq!(d, 90.0);
        assert_eq!(verdict, OutlierVerdict::Transition);
        assert_eq!(f.len(), 1);
        assert_eq!(f.median(), Some(90.0));
    }

    #[test]
    fn consistent_rejections_become_a_step() {
        let mut f = primed(&[20.0, 20.0, 20.0]);
        assert!(matches!(f.filter(60.0, SourceTag::Neural, false).1, OutlierVerdict::Replaced { .. }));
        assert!(matches!(f.filter(61.0, SourceTag::Neural, false).1, OutlierVerdict::Replaced { .. }));
        let (d, verdict) = f.filter(59.0, SourceTag::Neural, false);
        assert_eq!(d, 59.0);
        assert_eq!(verdict, OutlierVerdict::StepAccepted);
        assert_eq!(f.len(), 1);
    }

    #[test]
    fn scattered_rejections_do_not_step() {
        let mut f = primed(&[20.0, 20.0, 20.0]);
        f.filter(60.0, SourceTag::Neural, false);
        f.filter(5.0, SourceTag::Neural, false);
        let (d, verdict) = f.filter(200.0, SourceTag::Neural, false);
        assert_eq!(d, 20.0);
        assert!(matches!(verdict, OutlierVerdict::Replaced { .. }));
    }
}
