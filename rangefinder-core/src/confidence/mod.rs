//! Distance-Dependent Source Confidence
//!
//! ## Overview
//!
//! Every ranging source is trustworthy only inside its own operating band. This
//! module turns "how far away is the target" (plus auxiliary accuracy signals
//! such as GPS and heading accuracy) into a weight in [0, 1] per source. The
//! selector compares these weights against thresholds; nothing here holds state.
//!
//! ## Curve Shapes
//!
//! Curves are piecewise-linear over knot tables in [`crate::constants::sources`].
//! Between knots the weight is linearly interpolated; outside the table it is
//! held at the end value:
//!
//! ```text
//!  w
//!  │      k1 ●━━━━━━● k2
//!  │        ╱        ╲
//!  │       ╱          ╲
//!  │  k0  ●            ● k3 ━━━━━━ held
//!  └──────┴──────┴─────┴────────── d
//! ```
//!
//! Accuracy factors are step tables: the first tier whose bound covers the
//! reported accuracy wins, anything worse gets the floor.
//!
//! ## Scoring
//!
//! | Source      | Weight                                         |
//! |-------------|------------------------------------------------|
//! | Manual      | reading confidence                             |
//! | ShortRange  | curve(d) × reading confidence                  |
//! | ObjectSize  | curve(d) × detection confidence                |
//! | Terrain     | curve(d) × GPS tier × heading tier (×altitude) |
//! | Neural      | curve(d, cap) × calibration quality            |
//! | Geometric   | curve(d) × slope penalty                       |
//!
//! Terrain and geometric readings arrive with their curve already applied by
//! the component that produced them, so their reading confidence *is* their
//! weight.
//!
//! ## Usage Example
//!
//! ```rust
//! use rangefinder_core::confidence::SourceConfidenceModel;
//!
//! let model = SourceConfidenceModel::default();
//! assert!((model.short_range(1.5) - 0.98).abs() < 0.01);
//! assert_eq!(model.short_range(12.0), 0.0);
//! assert_eq!(model.neural(150.0), 0.0);
//! ```

mod sources;

pub use sources::{altitude_factor, gps_factor, heading_factor, SourceConfidenceModel};

/// Piecewise-linear interpolation over `(x, weight)` knots sorted by `x`
///
/// Held flat outside the table; non-finite input scores zero.
pub fn piecewise_linear(knots: &[(f64, f32)], x: f64) -> f32 {
    if !x.is_finite() {
        return 0.0;
    }
    let (first, last) = match (knots.first(), knots.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return 0.0,
    };
    if x <= first.0 {
        return first.1;
    }
    if x >= last.0 {
        return last.1;
    }

    for pair in knots.windows(2) {
        let (x0, w0) = pair[0];
        let (x1, w1) = pair[1];
        if x <= x1 {
            let span = x1 - x0;
            if span <= 0.0 {
                return w1;
            }
            let t = ((x - x0) / span) as f32;
            return w0 + (w1 - w0) * t;
        }
    }
    last.1
}

/// Step lookup over `(max_value, factor)` tiers sorted by `max_value`
///
/// Non-finite or negative accuracy is treated as unknown and gets the floor.
pub fn tiered(tiers: &[(f64, f32)], floor: f32, value: f64) -> f32 {
    if !value.is_finite() || value < 0.0 {
        return floor;
    }
    tiers
        .iter()
        .find(|(max, _)| value <= *max)
        .map(|(_, factor)| *factor)
        .unwrap_or(floor)
}
