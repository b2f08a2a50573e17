//! Weighted regression primitives for the calibrator
//!
//! ## Weighted Least Squares
//!
//! Fits `y = a·x + b` minimising `Σ wᵢ (yᵢ − a·xᵢ − b)²`:
//!
//! ```text
//! S  = Σw      Sx  = Σw·x     Sy  = Σw·y
//! Sxx = Σw·x²  Sxy = Σw·x·y
//!
//! denom = S·Sxx − Sx²
//! a     = (S·Sxy − Sx·Sy) / denom
//! b     = (Sy − a·Sx) / S
//! ```
//!
//! `denom / S²` is the weighted variance of `x`; when it collapses the samples
//! all sit at one abscissa and the slope is undefined.
//!
//! ## Goodness of Fit
//!
//! Weighted R² = 1 − SSres/SStot, clamped into [0, 1].

use crate::constants::calibration::SINGULAR_DENOMINATOR;
use crate::errors::{RangeError, RangeResult};

/// Result of a weighted linear fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    /// Slope
    pub slope: f64,
    /// Intercept
    pub intercept: f64,
    /// Weighted coefficient of determination in [0, 1]
    pub r_squared: f64,
}

/// Weighted least-squares line through `(x, y, w)` triples
pub fn weighted_linear_fit(points: &[(f64, f64, f64)]) -> RangeResult<LinearFit> {
    let mut s = 0.0;
    let mut sx = 0.0;
    let mut sy = 0.0;
    let mut sxx = 0.0;
    let mut sxy = 0.0;

    for &(x, y, w) in points {
        if w <= 0.0 || !w.is_finite() {
            continue;
        }
        s += w;
        sx += w * x;
        sy += w * y;
        sxx += w * x * x;
        sxy += w * x * y;
    }

    if s <= 0.0 {
        return Err(RangeError::InsufficientData {
            required: 2,
            available: 0,
        });
    }

    let denom = s * sxx - sx * sx;
    if !denom.is_finite() || denom.abs() <= SINGULAR_DENOMINATOR * s * s {
        return Err(RangeError::FitRejected {
            reason: "near-singular normal equations",
        });
    }

    let slope = (s * sxy - sx * sy) / denom;
    let intercept = (sy - slope * sx) / s;

    let mean_y = sy / s;
    let mut ss_tot = 0.0;
    let mut ss_res = 0.0;
    for &(x, y, w) in points {
        if w <= 0.0 || !w.is_finite() {
            continue;
        }
        let dev = y - mean_y;
        let res = y - (slope * x + intercept);
        ss_tot += w * dev * dev;
        ss_res += w * res * res;
    }

    let r_squared = if ss_tot <= f64::EPSILON {
        if ss_res <= f64::EPSILON { 1.0 } else { 0.0 }
    } else {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };

    Ok(LinearFit {
        slope,
        intercept,
        r_squared,
    })
}

/// Unweighted Pearson correlation, `None` when either variable is constant
pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    let n = pairs.len();
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / nf;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / nf;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for &(x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x <= f64::EPSILON || var_y <= f64::EPSILON {
        return None;
    }
    Some(cov / libm::sqrt(var_x * var_y))
}
