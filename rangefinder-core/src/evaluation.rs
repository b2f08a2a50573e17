//! Ground-Truth Evaluation
//!
//! Replays ranging estimates against a ground-truth manifest and reports
//! accuracy per distance band.
//!
//! | band       | range (m)     |
//! |------------|---------------|
//! | `close`    | 0.5 - 3       |
//! | `near_mid` | 3 - 8         |
//! | `mid`      | 8 - 15        |
//! | `far_mid`  | 15 - 50       |
//! | `far`      | 50 - 150      |
//! | `long`     | 150 - 350     |
//!
//! Bands are half-open (`lo <= d < hi`). Samples whose ground truth falls
//! outside every band are skipped.
//!
//! ```rust
//! use rangefinder_core::evaluation::{evaluate, GroundTruthManifest};
//!
//! let manifest = GroundTruthManifest::from_json_str(r#"{
//!     "version": "1.0.0",
//!     "samples": [
//!         { "dataset": "synthetic", "frame_id": "a", "ground_truth_center_m": 2.0, "lidar_center_m": 2.1 }
//!     ]
//! }"#)?;
//! let report = evaluate(&manifest, |sample| sample.lidar_center_m);
//! assert_eq!(report.overall.estimated, 1);
//! # Ok::<(), rangefinder_core::errors::RangeError>(())
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::errors::{RangeError, RangeResult};

/// Manifest major version this module understands
pub const SUPPORTED_MAJOR_VERSION: u32 = 1;

/// Relative error counted as a hit
pub const WITHIN_TOLERANCE: f64 = 0.10;

/// Ground-truth distance band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceBand {
    /// 0.5 - 3 m
    #[default]
    Close,
    /// 3 - 8 m
    NearMid,
    /// 8 - 15 m
    Mid,
    /// 15 - 50 m
    FarMid,
    /// 50 - 150 m
    Far,
    /// 150 - 350 m
    Long,
}

impl DistanceBand {
    /// Every band, nearest first
    pub const ALL: [DistanceBand; 6] = [
        DistanceBand::Close,
        DistanceBand::NearMid,
        DistanceBand::Mid,
        DistanceBand::FarMid,
        DistanceBand::Far,
        DistanceBand::Long,
    ];

    /// `(lo, hi)` in metres, half-open
    pub fn range(self) -> (f64, f64) {
        match self {
            DistanceBand::Close => (0.5, 3.0),
            DistanceBand::NearMid => (3.0, 8.0),
            DistanceBand::Mid => (8.0, 15.0),
            DistanceBand::FarMid => (15.0, 50.0),
            DistanceBand::Far => (50.0, 150.0),
            DistanceBand::Long => (150.0, 350.0),
        }
    }

    /// Band containing `distance_m`
    pub fn classify(distance_m: f64) -> Option<Self> {
        Self::ALL.into_iter().find(|band| {
            let (lo, hi) = band.range();
            (lo..hi).contains(&distance_m)
        })
    }

    /// Manifest name
    pub fn name(self) -> &'static str {
        match self {
            DistanceBand::Close => "close",
            DistanceBand::NearMid => "near_mid",
            DistanceBand::Mid => "mid",
            DistanceBand::FarMid => "far_mid",
            DistanceBand::Far => "far",
            DistanceBand::Long => "long",
        }
    }
}

impl fmt::Display for DistanceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One ground-truth frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthSample {
    /// Source dataset
    pub dataset: String,
    /// Frame identifier within the dataset
    pub frame_id: String,
    /// Ground-truth depth at the image centre (m)
    pub ground_truth_center_m: f64,
    /// Short-range sensor reading at the centre (m)
    #[serde(default)]
    pub lidar_center_m: Option<f64>,
    /// 25th percentile of the ground-truth map (m)
    #[serde(default)]
    pub ground_truth_p25_m: Option<f64>,
    /// 75th percentile of the ground-truth map (m)
    #[serde(default)]
    pub ground_truth_p75_m: Option<f64>,
    /// Camera intrinsics (`fx`, `fy`, `cx`, `cy`)
    #[serde(default)]
    pub intrinsics: Option<HashMap<String, f64>>,
    /// Image width (px)
    #[serde(default)]
    pub image_width: u32,
    /// Image height (px)
    #[serde(default)]
    pub image_height: u32,
    /// Free-form scene label (`indoor`, `outdoor`, ...)
    #[serde(default = "default_scene_type")]
    pub scene_type: String,
    /// Band recorded by the dataset tool
    #[serde(default)]
    pub distance_band: DistanceBand,
    /// Relative path of the stored depth map
    #[serde(default)]
    pub depth_map_file: Option<String>,
    /// Relative path of the stored image
    #[serde(default)]
    pub image_file: Option<String>,
}

fn default_scene_type() -> String {
    "indoor".to_string()
}

impl GroundTruthSample {
    /// Minimal sample, band derived from the ground truth
    pub fn new(dataset: &str, frame_id: &str, ground_truth_center_m: f64) -> Self {
        Self {
            dataset: dataset.to_string(),
            frame_id: frame_id.to_string(),
            ground_truth_center_m,
            lidar_center_m: None,
            ground_truth_p25_m: None,
            ground_truth_p75_m: None,
            intrinsics: None,
            image_width: 0,
            image_height: 0,
            scene_type: default_scene_type(),
            distance_band: DistanceBand::classify(ground_truth_center_m).unwrap_or_default(),
            depth_map_file: None,
            image_file: None,
        }
    }

    /// Band by the ground-truth distance (ignores the recorded label)
    pub fn band(&self) -> Option<DistanceBand> {
        DistanceBand::classify(self.ground_truth_center_m)
    }
}

/// Ground-truth manifest document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthManifest {
    /// Semantic version of the format
    pub version: String,
    /// Generation time, ISO 8601
    #[serde(default)]
    pub generated_date: Option<String>,
    /// Datasets the samples were drawn from
    #[serde(default)]
    pub dataset_sources: Vec<String>,
    /// Sample count declared by the writer
    #[serde(default)]
    pub total_samples: Option<usize>,
    /// Samples
    pub samples: Vec<GroundTruthSample>,
}

impl GroundTruthManifest {
    /// Manifest holding `samples`
    pub fn new(samples: Vec<GroundTruthSample>) -> Self {
        let mut sources: Vec<String> = samples.iter().map(|s| s.dataset.clone()).collect();
        sources.sort();
        sources.dedup();
        Self {
            version: "1.0.0".to_string(),
            generated_date: None,
            dataset_sources: sources,
            total_samples: Some(samples.len()),
            samples,
        }
    }

    /// Parse and check a JSON manifest
    pub fn from_json_str(json: &str) -> RangeResult<Self> {
        let manifest: Self = serde_json::from_str(json)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load and check a manifest file
    pub fn from_file(path: impl AsRef<Path>) -> RangeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Compact JSON
    pub fn to_json_string(&self) -> RangeResult<String> {
        serde_json::to_string(self).map_err(|e| RangeError::Config(e.to_string()))
    }

    /// Reject unknown major versions and non-physical ground truth
    pub fn validate(&self) -> RangeResult<()> {
        let major = self
            .version
            .split('.')
            .next()
            .and_then(|m| m.parse::<u32>().ok())
            .ok_or_else(|| RangeError::Config(format!("bad manifest version '{}'", self.version)))?;
        if major != SUPPORTED_MAJOR_VERSION {
            return Err(RangeError::Config(format!("unsupported manifest version {}", self.version)));
        }
        if let Some(declared) = self.total_samples {
            if declared != self.samples.len() {
                warn!(
                    "manifest declares {} samples but holds {}",
                    declared,
                    self.samples.len()
                );
            }
        }
        match self
            .samples
            .iter()
            .find(|s| !s.ground_truth_center_m.is_finite() || s.ground_truth_center_m <= 0.0)
        {
            Some(bad) => Err(RangeError::invalid(bad.ground_truth_center_m, "non-physical ground truth")),
            None => Ok(()),
        }
    }

    /// Samples per band by ground-truth distance
    pub fn band_counts(&self) -> HashMap<DistanceBand, usize> {
        let mut counts = HashMap::new();
        for band in self.samples.iter().filter_map(GroundTruthSample::band) {
            *counts.entry(band).or_insert(0) += 1;
        }
        counts
    }
}

/// Accuracy statistics over a set of samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Metrics {
    /// Samples with ground truth in range
    pub samples: usize,
    /// Samples that received an estimate
    pub estimated: usize,
    /// Mean absolute error (m)
    pub mae_m: f64,
    /// Mean of `|est - gt| / gt`
    pub mean_relative_error: f64,
    /// Fraction of estimates within 10% of ground truth
    pub within_10pct_rate: f64,
    /// `estimated / samples`
    pub coverage: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    samples: usize,
    estimated: usize,
    abs_sum: f64,
    rel_sum: f64,
    within: usize,
}

impl Accumulator {
    fn record(&mut self, truth: f64, estimate: Option<f64>) {
        self.samples += 1;
        let Some(estimate) = estimate.filter(|e| e.is_finite() && *e > 0.0) else {
            return;
        };
        let error = (estimate - truth).abs();
        let relative = error / truth;
        self.estimated += 1;
        self.abs_sum += error;
        self.rel_sum += relative;
        if relative <= WITHIN_TOLERANCE {
            self.within += 1;
        }
    }

    fn metrics(&self) -> Metrics {
        let n = self.estimated as f64;
        let mean = |sum: f64| if self.estimated == 0 { 0.0 } else { sum / n };
        Metrics {
            samples: self.samples,
            estimated: self.estimated,
            mae_m: mean(self.abs_sum),
            mean_relative_error: mean(self.rel_sum),
            within_10pct_rate: mean(self.within as f64),
            coverage: if self.samples == 0 {
                0.0
            } else {
                n / self.samples as f64
            },
        }
    }
}

/// Metrics for one band
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandReport {
    /// Band
    pub band: DistanceBand,
    /// Accuracy within the band
    pub metrics: Metrics,
}

/// Per-band and overall accuracy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    /// One entry per band, nearest first (empty bands included)
    pub bands: Vec<BandReport>,
    /// All in-band samples together
    pub overall: Metrics,
    /// Samples outside every band
    pub skipped: usize,
}

impl EvaluationReport {
    /// Metrics for `band`
    pub fn band(&self, band: DistanceBand) -> Option<&Metrics> {
        self.bands.iter().find(|r| r.band == band).map(|r| &r.metrics)
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<10} {:>6} {:>8} {:>8} {:>8} {:>8}", "band", "n", "mae_m", "rel", "≤10%", "cover")?;
        for report in &self.bands {
            let m = &report.metrics;
            writeln!(
                f,
                "{:<10} {:>6} {:>8.3} {:>8.3} {:>8.3} {:>8.3}",
                report.band.name(),
                m.samples,
                m.mae_m,
                m.mean_relative_error,
                m.within_10pct_rate,
                m.coverage
            )?;
        }
        let m = &self.overall;
        write!(
            f,
            "{:<10} {:>6} {:>8.3} {:>8.3} {:>8.3} {:>8.3}",
            "overall", m.samples, m.mae_m, m.mean_relative_error, m.within_10pct_rate, m.coverage
        )
    }
}

/// Score `estimate(sample)` against every sample of `manifest`
///
/// `None` from the estimator counts against coverage only.
pub fn evaluate<F>(manifest: &GroundTruthManifest, mut estimate: F) -> EvaluationReport
where
    F: FnMut(&GroundTruthSample) -> Option<f64>,
{
    let mut per_band: HashMap<DistanceBand, Accumulator> = HashMap::new();
    let mut overall = Accumulator::default();
    let mut skipped = 0;

    for sample in &manifest.samples {
        let Some(band) = sample.band() else {
            debug!("sample {} outside every band, skipped", sample.frame_id);
            skipped += 1;
            continue;
        };
        let value = estimate(sample);
        per_band.entry(band).or_default().record(sample.ground_truth_center_m, value);
        overall.record(sample.ground_truth_center_m, value);
    }

    EvaluationReport {
        bands: DistanceBand::ALL
            .into_iter()
            .map(|band| BandReport {
                band,
                metrics: per_band.get(&band).map(Accumulator::metrics).unwrap_or_default(),
            })
            .collect(),
        overall: overall.metrics(),
        skipped,
    }
}

/// Baseline: the short-range sensor reading recorded in the manifest
pub fn short_range_baseline(manifest: &GroundTruthManifest) -> EvaluationReport {
    evaluate(manifest, |sample| sample.lidar_center_m)
}
