//! Cross-sensor calibration under realistic conditions
//!
//! Noisy inverse-depth samples, a calibrator shared between the frame pipeline
//! and a background ingestion thread, and configuration loaded from disk.

mod common;

use std::io::Write;
use std::sync::Arc;
use std::thread;

use rangefinder_core::calibration::{CrossSensorCalibrator, TransformFamily};
use rangefinder_core::config::RangingConfig;
use rangefinder_core::pipeline::{FrameInput, FramePipeline, RangingContext};
use rangefinder_core::types::SemanticDecision;

use common::assert_close;
use common::generators::{flat_neural, TestRng, NEURAL_SCALE};
use common::scenarios::looking_north;

fn calibrator() -> CrossSensorCalibrator {
    let config = RangingConfig::default();
    CrossSensorCalibrator::new(config.calibration, config.sources.neural_max_distance_m)
}

#[test]
fn recovers_transform_from_noisy_samples() {
    let cal = calibrator();
    let mut rng = TestRng::new(7);
    for i in 0..20u64 {
        let truth = rng.gen_range(0.5, 7.5);
        let raw = f64::from(NEURAL_SCALE) / truth * (1.0 + rng.gen_range(-0.02, 0.02));
        let _ = cal.add_pair(raw, truth, 0.9, 1_000 + i * 100);
    }

    let state = cal.state();
    assert_eq!(state.family, TransformFamily::Inverse);
    assert!(state.fit_confidence > 0.5);
    assert_close(cal.calibrate(f64::from(NEURAL_SCALE) / 5.0).unwrap(), 5.0, 0.3);
    assert_close(cal.calibrate(f64::from(NEURAL_SCALE) / 30.0).unwrap(), 30.0, 2.0);
}

#[test]
fn shared_calibrator_accepts_concurrent_ingestion() {
    let cal = Arc::new(calibrator());
    let handles: Vec<_> = (0..4u64)
        .map(|worker| {
            let cal = Arc::clone(&cal);
            thread::spawn(move || {
                for i in 0..10u64 {
                    let truth = 1.0 + (i as f64) * 0.6;
                    let _ = cal.add_pair(10.0 / truth, truth, 1.0, worker * 10_000 + i * 100);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(cal.sample_count(), 40);
    assert!(cal.state().is_calibrated());
}

#[test]
fn background_ingestion_feeds_pipeline() {
    let context = RangingContext::new(RangingConfig::default()).unwrap();
    let shared = Arc::clone(context.calibrator());
    let pipeline = FramePipeline::new(Arc::new(context));

    for i in 0..12u64 {
        let truth = 1.0 + (i as f64) * 0.5;
        let _ = shared.add_pair(f64::from(NEURAL_SCALE) / truth, truth, 1.0, 1_000 + i * 100);
    }

    let input = FrameInput::new(2_200, looking_north(0.0)).with_neural(flat_neural(25.0));
    let result = pipeline.process(&input).unwrap();
    assert_eq!(result.decision, SemanticDecision::NeuralPrimary);
    assert_close(result.foreground.line_of_sight_m, 25.0, 0.5);
}

#[test]
fn uncalibrated_neural_is_ignored() {
    let context = RangingContext::new(RangingConfig::default()).unwrap();
    let pipeline = FramePipeline::new(Arc::new(context));
    let input = FrameInput::new(1_000, looking_north(0.0)).with_neural(flat_neural(25.0));
    assert_eq!(pipeline.process(&input).unwrap().decision, SemanticDecision::None);
}

#[test]
fn forced_family_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "calibration": {{ "forced_family": "Inverse", "window_capacity": 20 }},
             "sources": {{ "neural_max_distance_m": 60.0 }} }}"#
    )
    .unwrap();

    let config = RangingConfig::from_file(file.path()).unwrap();
    assert_eq!(config.calibration.forced_family, Some(TransformFamily::Inverse));

    let cal = CrossSensorCalibrator::new(config.calibration.clone(), config.sources.neural_max_distance_m);
    for i in 0..6u64 {
        let truth = 2.0 + i as f64;
        let _ = cal.add_pair(10.0 / truth, truth, 1.0, i * 100);
    }
    assert_eq!(cal.state().family, TransformFamily::Inverse);
    // Calibrated output stays below the configured cap
    let far = cal.calibrate(10.0 / 100.0).unwrap();
    assert!(far > 55.0 && far < 60.0);
}
