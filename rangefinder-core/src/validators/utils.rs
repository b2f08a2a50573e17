//! Shared Ingestion Checks
//!
//! Pure helpers used by every validator. Each returns `RangeError::InvalidSample`
//! naming the violated condition, so callers can log the reason and drop the
//! sample without inspecting it further.

use crate::errors::{RangeError, RangeResult};

/// Value must be a finite number
pub fn check_finite(value: f64) -> RangeResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(RangeError::invalid(value, "not finite"))
    }
}

/// Value must be finite and strictly positive
pub fn check_positive(value: f64) -> RangeResult<()> {
    check_finite(value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(RangeError::invalid(value, "not positive"))
    }
}

/// Value must be finite and inside `[min, max]`
pub fn check_range(value: f64, min: f64, max: f64) -> RangeResult<()> {
    check_finite(value)?;
    if value < min || value > max {
        return Err(RangeError::invalid(value, "outside valid band"));
    }
    Ok(())
}

/// Confidence must be finite and inside `[0, 1]`
pub fn check_confidence(confidence: f32) -> RangeResult<()> {
    let value = f64::from(confidence);
    check_finite(value)?;
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(RangeError::invalid(value, "confidence outside [0, 1]"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_checks() {
        assert!(check_range(5.0, 0.3, 8.0).is_ok());
        assert!(check_range(0.3, 0.3, 8.0).is_ok());
        assert!(check_range(8.1, 0.3, 8.0).is_err());
        assert!(check_range(f64::NAN, 0.3, 8.0).is_err());
    }

    #[test]
    fn positivity() {
        assert!(check_positive(0.01).is_ok());
        assert!(check_positive(0.0).is_err());
        assert!(check_positive(-2.0).is_err());
        assert!(check_positive(f64::INFINITY).is_err());
    }

    #[test]
    fn confidence_bounds() {
        assert!(check_confidence(0.0).is_ok());
        assert!(check_confidence(1.0).is_ok());
        assert!(check_confidence(1.5).is_err());
        assert!(check_confidence(f32::NAN).is_err());
    }
}
