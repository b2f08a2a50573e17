//! Scene Understanding
//!
//! Cheap per-frame statistics over dense depth maps used to gate sources that
//! are known to fail in specific scenes:
//!
//! - [`SceneClassifier`]: sky / ground / structure / unknown at the aim point
//! - [`BimodalDepthAnalyzer`]: near/far split when the aim point straddles a depth edge
//! - [`DepthMap`]: shared container with aim-point patch sampling

pub mod bimodal;
pub mod classifier;
pub mod depth_map;

pub use bimodal::BimodalDepthAnalyzer;
pub use classifier::{classify_frame, SceneClassifier};
pub use depth_map::{DepthEncoding, DepthMap};
