//! Shared fixtures for the integration tests
//!
//! - `generators`: deterministic depth maps, elevation tiles and noise
//! - `scenarios`: ready-made pipelines and frame sequences

#![allow(dead_code)]

pub mod generators;
pub mod scenarios;

/// Assert `actual` lies within `tol` of `expected`
#[track_caller]
pub fn assert_close(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() <= tol,
        "expected {expected} ± {tol}, got {actual}"
    );
}
