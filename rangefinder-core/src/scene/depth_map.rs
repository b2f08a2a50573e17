//! Dense depth maps and aim-point sampling
//!
//! Two encodings arrive per frame:
//!
//! | Encoding          | Producer           | Larger value means |
//! |-------------------|--------------------|--------------------|
//! | `Metric`          | short-range sensor | farther            |
//! | `InverseRelative` | neural network     | closer             |
//!
//! [`DepthMap::relative_depth`] hides the difference for the statistics that
//! only need ratios and ordering (scene classification, histograms).

use crate::constants::scene::{
    CENTER_PATCH_MIN_VALID, CENTER_PATCH_RADIUS, DEPTH_MAX_VALID_M, DEPTH_MIN_VALID_M,
};
use crate::errors::{RangeError, RangeResult};

/// Meaning of the stored values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthEncoding {
    /// Metres along the optical axis
    Metric,
    /// Unitless inverse depth with unknown scale
    InverseRelative,
}

/// Row-major depth image
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    width: usize,
    height: usize,
    data: Vec<f32>,
    confidence: Option<Vec<f32>>,
    encoding: DepthEncoding,
}

impl DepthMap {
    /// Wrap a row-major buffer of `width × height` values
    pub fn new(width: usize, height: usize, data: Vec<f32>, encoding: DepthEncoding) -> RangeResult<Self> {
        let expected = width * height;
        if width == 0 || height == 0 || data.len() != expected {
            return Err(RangeError::InsufficientData {
                required: expected.max(1),
                available: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
            confidence: None,
            encoding,
        })
    }

    /// Build by evaluating `f(x, y)` for every pixel
    pub fn from_fn(
        width: usize,
        height: usize,
        encoding: DepthEncoding,
        mut f: impl FnMut(usize, usize) -> f32,
    ) -> RangeResult<Self> {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self::new(width, height, data, encoding)
    }

    /// Attach a per-pixel confidence map in [0, 1] of the same size
    pub fn with_confidence(mut self, confidence: Vec<f32>) -> RangeResult<Self> {
        if confidence.len() != self.data.len() {
            return Err(RangeError::InsufficientData {
                required: self.data.len(),
                available: confidence.len(),
            });
        }
        self.confidence = Some(confidence);
        Ok(self)
    }

    /// Width in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> usize {
        self.height
    }

    /// Value encoding
    pub fn encoding(&self) -> DepthEncoding {
        self.encoding
    }

    /// Raw stored value
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.width + x).copied()
    }

    /// Pixel under normalized coordinates (`u` right, `v` down, both in [0, 1])
    pub fn pixel_at(&self, u: f32, v: f32) -> (usize, usize) {
        let x = (u.clamp(0.0, 1.0) * (self.width - 1) as f32).round() as usize;
        let y = (v.clamp(0.0, 1.0) * (self.height - 1) as f32).round() as usize;
        (x, y)
    }

    /// Value passes the encoding's validity band
    pub fn is_valid_value(&self, value: f32) -> bool {
        if !value.is_finite() {
            return false;
        }
        match self.encoding {
            DepthEncoding::Metric => value > DEPTH_MIN_VALID_M && value < DEPTH_MAX_VALID_M,
            DepthEncoding::InverseRelative => value > 0.0,
        }
    }

    /// Valid value at normalized coordinates
    pub fn sample(&self, u: f32, v: f32) -> Option<f32> {
        let (x, y) = self.pixel_at(u, v);
        self.get(x, y).filter(|value| self.is_valid_value(*value))
    }

    /// Depth-ordered value (farther is larger) at normalized coordinates
    pub fn relative_depth(&self, u: f32, v: f32) -> Option<f32> {
        self.sample(u, v).map(|value| self.to_relative(value))
    }

    /// Convert a stored value to depth order
    pub fn to_relative(&self, value: f32) -> f32 {
        match self.encoding {
            DepthEncoding::Metric => value,
            DepthEncoding::InverseRelative => 1.0 / value,
        }
    }

    /// Median of the valid values in the 5×5 patch around the aim point
    ///
    /// Needs at least three valid values; edges use the part of the patch
    /// that lies inside the image.
    pub fn center_patch_median(&self, u: f32, v: f32) -> Option<f32> {
        let (cx, cy) = self.pixel_at(u, v);
        let r = CENTER_PATCH_RADIUS;
        let mut values: heapless::Vec<f32, 25> = heapless::Vec::new();

        for y in cy.saturating_sub(r)..=(cy + r).min(self.height - 1) {
            for x in cx.saturating_sub(r)..=(cx + r).min(self.width - 1) {
                if let Some(value) = self.get(x, y).filter(|v| self.is_valid_value(*v)) {
                    let _ = values.push(value);
                }
            }
        }

        if values.len() < CENTER_PATCH_MIN_VALID {
            return None;
        }
        values.sort_unstable_by(|a, b| a.total_cmp(b));
        let mid = values.len() / 2;
        Some(if values.len() % 2 == 0 {
            (values[mid - 1] + values[mid]) * 0.5
        } else {
            values[mid]
        })
    }

    /// Mean confidence over the aim-point patch, 1.0 without a confidence map
    pub fn center_patch_confidence(&self, u: f32, v: f32) -> f32 {
        let Some(conf) = &self.confidence else {
            return 1.0;
        };
        let (cx, cy) = self.pixel_at(u, v);
        let r = CENTER_PATCH_RADIUS;
        let mut sum = 0.0;
        let mut count = 0u32;
        for y in cy.saturating_sub(r)..=(cy + r).min(self.height - 1) {
            for x in cx.saturating_sub(r)..=(cx + r).min(self.width - 1) {
                if let Some(c) = conf.get(y * self.width + x).filter(|c| c.is_finite()) {
                    sum += c.clamp(0.0, 1.0);
                    count += 1;
                }
            }
        }
        if count == 0 { 0.0 } else { sum / count as f32 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_mismatch_rejected() {
        assert!(DepthMap::new(4, 4, vec![1.0; 15], DepthEncoding::Metric).is_err());
        assert!(DepthMap::new(0, 4, vec![], DepthEncoding::Metric).is_err());
    }

    #[test]
    fn patch_median_ignores_invalid() {
        let map = DepthMap::from_fn(9, 9, DepthEncoding::Metric, |x, y| {
            if (x + y) % 3 == 0 { f32::NAN } else { 4.0 + (x as f32) * 0.01 }
        })
        .unwrap();
        let median = map.center_patch_median(0.5, 0.5).unwrap();
        assert!((median - 4.04).abs() < 0.02);
    }

    #[test]
    fn patch_needs_three_values() {
        let map = DepthMap::from_fn(5, 5, DepthEncoding::Metric, |x, y| {
            if x == 2 && y < 2 { 3.0 } else { 0.0 }
        })
        .unwrap();
        assert!(map.center_patch_median(0.5, 0.5).is_none());
    }

    #[test]
    fn metric_band_excludes_extremes() {
        let map = DepthMap::new(1, 1, vec![1.0], DepthEncoding::Metric).unwrap();
        assert!(!map.is_valid_value(0.05));
        assert!(!map.is_valid_value(1500.0));
        assert!(map.is_valid_value(0.5));
    }

    #[test]
    fn inverse_relative_ordering() {
        let map = DepthMap::from_fn(2, 1, DepthEncoding::InverseRelative, |x, _| {
            if x == 0 { 4.0 } else { 0.5 }
        })
        .unwrap();
        assert!(map.relative_depth(1.0, 0.0).unwrap() > map.relative_depth(0.0, 0.0).unwrap());
    }

    #[test]
    fn confidence_map_average() {
        let map = DepthMap::new(3, 3, vec![2.0; 9], DepthEncoding::Metric)
            .unwrap()
            .with_confidence(vec![0.5; 9])
            .unwrap();
        assert!((map.center_patch_confidence(0.5, 0.5) - 0.5).abs() < 1e-6);

        let bare = DepthMap::new(3, 3, vec![2.0; 9], DepthEncoding::Metric).unwrap();
        assert_eq!(bare.center_patch_confidence(0.5, 0.5), 1.0);
    }
}
