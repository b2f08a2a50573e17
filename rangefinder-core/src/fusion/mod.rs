//! Source Selection and Temporal Fusion
//!
//! ## Overview
//!
//! Per-frame readings are noisy and individually unreliable. This module turns
//! them into two stable distances:
//!
//! ```text
//! readings ──► SemanticSourceSelector ──► (primary, background)
//!                                               │
//!                                               ▼
//!                                     DualHypothesisTracker
//!                                      ├── foreground chain ──► RangeOutput
//!                                      └── background chain ──► RangeOutput
//! ```
//!
//! ## Kalman Filter
//!
//! ```text
//! State Prediction:    x̂ₖ = Fₖ·xₖ₋₁
//! Covariance Update:   Pₖ = Fₖ·Pₖ₋₁·Fₖᵀ + Qₖ
//! Innovation:          yₖ = zₖ - Hₖ·x̂ₖ
//! Kalman Gain:         Kₖ = Pₖ·Hₖᵀ·(Hₖ·Pₖ·Hₖᵀ + Rₖ)⁻¹
//! State Update:        xₖ = x̂ₖ + Kₖ·yₖ
//! ```
//!
//! ## Numerical Stability
//!
//! - **Symmetric enforcement**: covariance kept symmetric after every step
//! - **Joseph form**: covariance update stays positive definite under rounding
//! - **Divergence check**: a non-finite state reseeds the filter
//!
//! ## Memory Model
//!
//! Everything is fixed size: two 2×2 filters, two 5-entry ring buffers and two
//! scalar smoothers per tracker.

pub mod kalman;
pub mod matrix;
pub mod outlier;
pub mod selector;
pub mod smoother;
pub mod tracker;

pub use kalman::{DistanceKalman, KalmanEstimate};
pub use outlier::{OutlierFilter, OutlierVerdict};
pub use selector::{Candidates, SemanticSourceSelector, Selection};
pub use smoother::MotionSmoother;
pub use tracker::{DualHypothesisTracker, Hypothesis, TrackedRanges, TrackerFrame};

use thiserror::Error;

/// Result type for filter operations
pub type FusionResult<T> = Result<T, FusionError>;

/// Numerical failures inside a distance filter
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionError {
    /// Innovation covariance could not be inverted
    #[error("innovation covariance is singular")]
    SingularInnovation,
    /// State or covariance became non-finite
    #[error("filter diverged")]
    Diverged,
}
