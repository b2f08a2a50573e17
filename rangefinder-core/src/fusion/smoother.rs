//! Motion-adaptive exponential smoothing
//!
//! A braced device wants a calm readout, a sweeping one wants responsiveness,
//! so alpha follows the motion tier. Large jumps are held until they persist:
//!
//! ```text
//! |x − y| / y < 30 %   →  y ← y + α(x − y)
//! |x − y| / y ≥ 30 %   →  hold y; snap to x on the 3rd consecutive frame
//! ```
//!
//! Held samples only count toward the snap while each agrees with the one
//! before it (within the same 30 %); scattered spikes never confirm a jump.

use crate::config::TrackerConfig;
use crate::types::MotionState;

/// Exponential smoother with discontinuity confirmation
#[derive(Debug, Clone)]
pub struct MotionSmoother {
    config: TrackerConfig,
    value: Option<f64>,
    pending: u32,
    last_pending: Option<f64>,
}

impl MotionSmoother {
    /// Smoother using the tracker's alphas and discontinuity policy
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            config: config.clone(),
            value: None,
            pending: 0,
            last_pending: None,
        }
    }

    /// Alpha for a motion tier
    pub fn alpha(&self, motion: MotionState) -> f64 {
        match motion {
            MotionState::Stationary => self.config.alpha_stationary,
            MotionState::Tracking => self.config.alpha_tracking,
            MotionState::Panning => self.config.alpha_panning,
        }
    }

    /// Last smoothed value
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Forget the smoothed value
    pub fn reset(&mut self) {
        self.value = None;
        self.clear_pending();
    }

    fn clear_pending(&mut self) {
        self.pending = 0;
        self.last_pending = None;
    }

    fn relative_change(from: f64, to: f64) -> f64 {
        if from > 0.0 {
            (to - from).abs() / from
        } else {
            f64::INFINITY
        }
    }

    /// Feed a sample and return the smoothed value
    pub fn smooth(&mut self, sample: f64, motion: MotionState) -> f64 {
        let Some(current) = self.value else {
            self.value = Some(sample);
            return sample;
        };

        let ratio = self.config.discontinuity_ratio;
        let next = if Self::relative_change(current, sample) >= ratio {
            let agrees = self
                .last_pending
                .is_some_and(|prev| Self::relative_change(prev, sample) < ratio);
            self.pending = if agrees { self.pending + 1 } else { 1 };
            self.last_pending = Some(sample);
            if self.pending >= self.config.discontinuity_confirm_frames {
                self.clear_pending();
                sample
            } else {
                current
            }
        } else {
            self.clear_pending();
            current + self.alpha(motion) * (sample - current)
        };
        self.value = Some(next);
        next
    }
}
