//! Constant-velocity distance filter
//!
//! One filter per hypothesis. State is `[distance, range rate]`, the
//! measurement is the selected source's distance:
//!
//! ```text
//! Prediction:   x̂ = F·x          F = | 1  dt |
//!               P = F·P·Fᵀ + Q        | 0   1 |
//!
//!               Q = q · | dt³/3  dt²/2 |     q from the motion tier
//!                       | dt²/2  dt    |
//!
//! Update:       y = z − H·x̂       H = [1 0]
//!               S = H·P·Hᵀ + R    R = (0.02·d)² / max(conf, 0.05)
//!               K = P·Hᵀ·S⁻¹          × (d/100)² beyond 100 m
//!               x = x̂ + K·y
//!               P = (I − K·H)·P·(I − K·H)ᵀ + K·R·Kᵀ   (Joseph form)
//! ```
//!
//! The first measurement after a reset seeds the state directly, keeping the
//! wide initial covariance so later readings pull it quickly.

use crate::constants::tracking::{
    INITIAL_DISTANCE_VARIANCE, INITIAL_VELOCITY_VARIANCE, MAX_PREDICT_DT_S, MEASUREMENT_MIN_CONFIDENCE,
    MEASUREMENT_NOISE_KNEE_M, MEASUREMENT_RELATIVE_STD, PROCESS_NOISE_PANNING, PROCESS_NOISE_STATIONARY,
    PROCESS_NOISE_TRACKING,
};
use crate::time::{seconds_between, Timestamp};
use crate::types::MotionState;

use super::matrix::{add, identity, invert, is_finite, make_symmetric, matvec, multiply, transpose, Matrix, SquareMatrix, Vector};
use super::{FusionError, FusionResult};

const H: Matrix<1, 2> = [[1.0, 0.0]];

/// Snapshot of a filter's estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KalmanEstimate {
    /// Filtered distance (m)
    pub distance_m: f64,
    /// Range rate (m/s, positive = receding)
    pub velocity_mps: f64,
    /// Distance variance (m²)
    pub variance_m2: f64,
}

impl KalmanEstimate {
    /// One-sigma distance uncertainty (m)
    pub fn std_m(&self) -> f64 {
        libm::sqrt(self.variance_m2.max(0.0))
    }
}

/// Process noise spectral density for a motion tier
pub fn process_noise(motion: MotionState) -> f64 {
    match motion {
        MotionState::Stationary => PROCESS_NOISE_STATIONARY,
        MotionState::Tracking => PROCESS_NOISE_TRACKING,
        MotionState::Panning => PROCESS_NOISE_PANNING,
    }
}

/// Measurement variance for a distance reported with `confidence`
pub fn measurement_noise(distance_m: f64, confidence: f32) -> f64 {
    let sigma = MEASUREMENT_RELATIVE_STD * distance_m;
    let mut r = sigma * sigma / f64::from(confidence).max(MEASUREMENT_MIN_CONFIDENCE);
    if distance_m > MEASUREMENT_NOISE_KNEE_M {
        let k = distance_m / MEASUREMENT_NOISE_KNEE_M;
        r *= k * k;
    }
    r.max(1e-6)
}

/// Two-state distance/velocity Kalman filter
#[derive(Debug, Clone)]
pub struct DistanceKalman {
    state: Vector<2>,
    covariance: SquareMatrix<2>,
    last_update: Option<Timestamp>,
    updates: u32,
}

impl Default for DistanceKalman {
    fn default() -> Self {
        Self::new()
    }
}

impl DistanceKalman {
    /// Filter in its reset state
    pub fn new() -> Self {
        Self {
            state: [0.0; 2],
            covariance: initial_covariance(),
            last_update: None,
            updates: 0,
        }
    }

    /// Back to the wide initial covariance, forgetting the state
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// A measurement has been absorbed since the last reset
    pub fn is_initialized(&self) -> bool {
        self.last_update.is_some()
    }

    /// Current covariance
    pub fn covariance(&self) -> SquareMatrix<2> {
        self.covariance
    }

    /// Measurements absorbed since the last reset
    pub fn update_count(&self) -> u32 {
        self.updates
    }

    /// Current estimate
    pub fn estimate(&self) -> KalmanEstimate {
        KalmanEstimate {
            distance_m: self.state[0],
            velocity_mps: self.state[1],
            variance_m2: self.covariance[0][0],
        }
    }

    /// Propagate by `dt_s` seconds under spectral density `q`
    pub fn predict(&mut self, dt_s: f64, q: f64) {
        if dt_s <= 0.0 {
            return;
        }
        let f: SquareMatrix<2> = [[1.0, dt_s], [0.0, 1.0]];
        let mut predicted = [0.0; 2];
        matvec(&f, &self.state, &mut predicted);
        self.state = predicted;

        let mut fp = [[0.0; 2]; 2];
        multiply(&f, &self.covariance, &mut fp);
        let mut ft = [[0.0; 2]; 2];
        transpose(&f, &mut ft);
        let mut fpft = [[0.0; 2]; 2];
        multiply(&fp, &ft, &mut fpft);

        let dt2 = dt_s * dt_s;
        let noise: SquareMatrix<2> = [
            [q * dt2 * dt_s / 3.0, q * dt2 / 2.0],
            [q * dt2 / 2.0, q * dt_s],
        ];
        add(&fpft, &noise, &mut self.covariance);
        make_symmetric(&mut self.covariance);
    }

    /// Absorb a distance measurement with variance `r`
    pub fn correct(&mut self, z: f64, r: f64) -> FusionResult<()> {
        let mut ht = [[0.0; 1]; 2];
        transpose(&H, &mut ht);

        let mut hp = [[0.0; 2]; 1];
        multiply(&H, &self.covariance, &mut hp);
        let mut s = [[0.0; 1]; 1];
        multiply(&hp, &ht, &mut s);
        s[0][0] += r;

        let mut s_inv = [[0.0; 1]; 1];
        if !invert(&s, &mut s_inv) {
            return Err(FusionError::SingularInnovation);
        }

        let mut pht = [[0.0; 1]; 2];
        multiply(&self.covariance, &ht, &mut pht);
        let mut gain = [[0.0; 1]; 2];
        multiply(&pht, &s_inv, &mut gain);

        let innovation = z - self.state[0];
        self.state[0] += gain[0][0] * innovation;
        self.state[1] += gain[1][0] * innovation;

        self.joseph_update(&gain, r);

        if !is_finite(&self.covariance) || !self.state.iter().all(|v| v.is_finite()) {
            return Err(FusionError::Diverged);
        }
        Ok(())
    }

    fn joseph_update(&mut self, gain: &Matrix<2, 1>, r: f64) {
        let mut kh = [[0.0; 2]; 2];
        multiply(gain, &H, &mut kh);
        let mut i_kh: SquareMatrix<2> = identity();
        for i in 0..2 {
            for j in 0..2 {
                i_kh[i][j] -= kh[i][j];
            }
        }

        let mut left = [[0.0; 2]; 2];
        multiply(&i_kh, &self.covariance, &mut left);
        let mut i_kh_t = [[0.0; 2]; 2];
        transpose(&i_kh, &mut i_kh_t);
        let mut p = [[0.0; 2]; 2];
        multiply(&left, &i_kh_t, &mut p);

        let mut k_t = [[0.0; 2]; 1];
        transpose(gain, &mut k_t);
        let mut krk = [[0.0; 2]; 2];
        multiply(gain, &k_t, &mut krk);
        for row in krk.iter_mut() {
            for v in row.iter_mut() {
                *v *= r;
            }
        }

        add(&p, &krk, &mut self.covariance);
        make_symmetric(&mut self.covariance);
    }

    /// Predict to `timestamp` and absorb a reading
    ///
    /// A divergent update resets the filter and reseeds it from `z`.
    pub fn step(&mut self, z: f64, confidence: f32, motion: MotionState, timestamp: Timestamp) -> KalmanEstimate {
        let r = measurement_noise(z, confidence);
        match self.last_update {
            None => self.state = [z, 0.0],
            Some(last) => {
                let dt = seconds_between(last, timestamp).min(MAX_PREDICT_DT_S);
                self.predict(dt, process_noise(motion));
            }
        }

        if let Err(err) = self.correct(z, r) {
            log::warn!("distance filter {}; reseeding at {:.1} m", err, z);
            self.reset();
            self.state = [z, 0.0];
        }
        self.last_update = Some(timestamp);
        self.updates = self.updates.saturating_add(1);
        self.estimate()
    }
}

fn initial_covariance() -> SquareMatrix<2> {
    [[INITIAL_DISTANCE_VARIANCE, 0.0], [0.0, INITIAL_VELOCITY_VARIANCE]]
}
