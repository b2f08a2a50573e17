//! Frame Pipeline
//!
//! ## Overview
//!
//! Glue between the sensors and the fusion layer. A [`FramePipeline`] owns the
//! per-stream state (scene cache, terrain result cache, selector, tracker) and
//! borrows the long-lived [`RangingContext`] (configuration, shared calibrator,
//! resident elevation tiles).
//!
//! ```text
//! sensors ──► FrameInput ──► FramePipeline::process ──► FrameResult
//!                                  │
//!                           RangingContext (Arc)
//!                       config · calibrator · tiles
//! ```
//!
//! ## Module Organization
//!
//! - `frame` - input and output types
//! - `processor` - the per-frame stage sequence
//! - `context` - shared configuration and collaborators
//! - `cancel` - cooperative cancellation flag

pub mod cancel;
pub mod context;
pub mod frame;
pub mod processor;

pub use cancel::CancellationToken;
pub use context::RangingContext;
pub use frame::{FrameInput, FrameResult, Orientation, PositionFix};
pub use processor::FramePipeline;
