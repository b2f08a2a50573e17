//! Lightweight scene classification at the aim point
//!
//! ```text
//!            ● up (v − 5%)
//!            │
//! left ●─────●─────● right        8×8 global grid for max / median
//!            │ centre (aim)
//!            ● down (v + 5%)
//! ```
//!
//! | Class     | Test                                                          |
//! |-----------|---------------------------------------------------------------|
//! | Sky       | not aimed down, centre ≥ 90% global max, ≥ 1.5× median, CV < 0.08 |
//! | Structure | pitch above −20°, a cross neighbour differs from centre > 2×  |
//! | Ground    | aimed down (< −3°), depth rises upward with steps in (1, 3)   |
//! | Unknown   | otherwise                                                     |
//!
//! Classification is recomputed every N frames; intermediate frames return the
//! cached class.

use log::debug;

use crate::config::SceneConfig;
use crate::constants::scene::*;
use crate::types::{SceneClass, SceneClassification};

use super::depth_map::DepthMap;

/// Frame-counted, cached scene classifier
#[derive(Debug, Clone)]
pub struct SceneClassifier {
    every_n_frames: u32,
    frame_counter: u32,
    cached: SceneClassification,
}

impl SceneClassifier {
    /// Classifier with the configured cadence
    pub fn new(config: &SceneConfig) -> Self {
        Self {
            every_n_frames: config.classify_every_n_frames.max(1),
            frame_counter: 0,
            cached: SceneClassification::default(),
        }
    }

    /// Classify the current frame, or return the cached class between updates
    pub fn classify(&mut self, map: &DepthMap, aim: (f32, f32), pitch_rad: f64) -> SceneClassification {
        let class = self.peek(map, aim, pitch_rad);
        self.commit(class);
        class
    }

    /// Class this frame would report, leaving the cadence untouched
    pub fn peek(&self, map: &DepthMap, aim: (f32, f32), pitch_rad: f64) -> SceneClassification {
        if self.is_due() {
            classify_frame(map, aim, pitch_rad)
        } else {
            self.cached
        }
    }

    /// Advance the cadence by one frame, keeping `class` if this frame was due
    pub fn commit(&mut self, class: SceneClassification) {
        if self.is_due() {
            if class.class != self.cached.class {
                debug!("scene class {:?} → {:?}", self.cached.class, class.class);
            }
            self.cached = class;
        }
        self.frame_counter = self.frame_counter.wrapping_add(1);
    }

    /// Next frame recomputes the class
    pub fn is_due(&self) -> bool {
        self.frame_counter % self.every_n_frames == 0
    }

    /// Last computed class
    pub fn cached(&self) -> SceneClassification {
        self.cached
    }

    /// Forget the cached class and restart the cadence
    pub fn reset(&mut self) {
        self.frame_counter = 0;
        self.cached = SceneClassification::default();
    }
}

struct Cross {
    center: f32,
    left: Option<f32>,
    right: Option<f32>,
    up: Option<f32>,
    down: Option<f32>,
}

impl Cross {
    fn neighbours(&self) -> impl Iterator<Item = f32> + '_ {
        [self.left, self.right, self.up, self.down].into_iter().flatten()
    }

    fn coefficient_of_variation(&self) -> f32 {
        let mut values: heapless::Vec<f32, 5> = heapless::Vec::new();
        let _ = values.push(self.center);
        for v in self.neighbours() {
            let _ = values.push(v);
        }
        let n = values.len() as f32;
        let mean = values.iter().sum::<f32>() / n;
        if mean <= 0.0 {
            return f32::INFINITY;
        }
        let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
        libm::sqrtf(var) / mean
    }
}

/// Stateless single-frame classification
pub fn classify_frame(map: &DepthMap, aim: (f32, f32), pitch_rad: f64) -> SceneClassification {
    let (u, v) = aim;
    let Some(center) = map.relative_depth(u, v) else {
        return SceneClassification::default();
    };
    let o = CROSS_OFFSET_FRACTION;
    let cross = Cross {
        center,
        left: map.relative_depth(u - o, v),
        right: map.relative_depth(u + o, v),
        up: map.relative_depth(u, v - o),
        down: map.relative_depth(u, v + o),
    };

    let Some((global_max, global_median)) = global_stats(map) else {
        return SceneClassification::default();
    };

    // Sky
    if pitch_rad >= SKY_MIN_PITCH_RAD
        && center >= SKY_MAX_DEPTH_FRACTION * global_max
        && center >= SKY_MEDIAN_RATIO * global_median
    {
        let cv = cross.coefficient_of_variation();
        if cv < SKY_MAX_CV {
            return SceneClassification {
                class: SceneClass::Sky,
                confidence: (1.0 - 0.5 * cv / SKY_MAX_CV).clamp(0.5, 1.0),
            };
        }
    }

    // Structure
    if pitch_rad > STRUCTURE_MIN_PITCH_RAD {
        let max_ratio = cross
            .neighbours()
            .filter(|n| *n > 0.0 && center > 0.0)
            .map(|n| if n > center { n / center } else { center / n })
            .fold(0.0f32, f32::max);
        if max_ratio > STRUCTURE_RATIO {
            return SceneClassification {
                class: SceneClass::Structure,
                confidence: (max_ratio / (2.0 * STRUCTURE_RATIO)).clamp(0.5, 1.0),
            };
        }
    }

    // Ground
    if pitch_rad < GROUND_MAX_PITCH_RAD {
        if let (Some(down), Some(up)) = (cross.down, cross.up) {
            let lower = center / down;
            let upper = up / center;
            let in_band = |r: f32| r > 1.0 && r < GROUND_MAX_STEP_RATIO;
            if down > 0.0 && in_band(lower) && in_band(upper) {
                return SceneClassification {
                    class: SceneClass::Ground,
                    confidence: 0.7,
                };
            }
        }
    }

    SceneClassification::default()
}

/// Max and median of the valid values on the global grid
fn global_stats(map: &DepthMap) -> Option<(f32, f32)> {
    let side = GLOBAL_GRID_SIDE;
    let mut values: heapless::Vec<f32, { GLOBAL_GRID_SIDE * GLOBAL_GRID_SIDE }> = heapless::Vec::new();
    for j in 0..side {
        for i in 0..side {
            let u = (i as f32 + 0.5) / side as f32;
            let v = (j as f32 + 0.5) / side as f32;
            if let Some(d) = map.relative_depth(u, v) {
                let _ = values.push(d);
            }
        }
    }
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    let max = values[values.len() - 1];
    let median = values[values.len() / 2];
    Some((max, median))
}
