// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use capture_control::Config;
use capture_control::config::{NrMode, RawPref};
use capture_control::pipelines::photo::CaptureMode;
use std::path::PathBuf;

fn scratch_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("capture-control-test-{}", uuid::Uuid::new_v4()))
        .join(name)
}

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.queue.capacity, 30);
    assert_eq!(config.capture.mode, CaptureMode::Standard);
    assert_eq!(config.capture.raw, RawPref::JpegOnly);
    assert_eq!(config.panorama.max_pics, 10);
    assert!(config.device.supports_noise_reduction);
}

#[test]
fn test_config_save_and_load() {
    let path = scratch_path("config.json");
    let mut config = Config::default();
    config.capture.mode = CaptureMode::NoiseReduction;
    config.capture.nr_mode = NrMode::LowLight;
    config.queue.capacity = 12;

    config.save_to(&path).unwrap();
    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, config);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn test_missing_file_gives_defaults() {
    let path = scratch_path("missing.json");
    assert_eq!(Config::load_from(&path).unwrap(), Config::default());
}

#[test]
fn test_partial_file_fills_defaults() {
    let path = scratch_path("partial.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, r#"{ "capture": { "mode": "Panorama" } }"#).unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.capture.mode, CaptureMode::Panorama);
    assert_eq!(config.capture.fast_burst_n_images, 5);
    assert_eq!(config.queue, Default::default());

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn test_corrupt_file_is_config_error() {
    let path = scratch_path("corrupt.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();

    let err = Config::load_from(&path).unwrap_err();
    assert!(matches!(err, capture_control::PipelineError::Config(_)));

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn test_unusable_panorama_geometry_is_replaced() {
    let path = scratch_path("panorama.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        r#"{ "panorama": { "pics_per_screen": 0.0, "max_pics": 0, "target_angle_deg": -1.0 } }"#,
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    let defaults = capture_control::config::PanoramaSettings::default();
    assert_eq!(config.panorama.pics_per_screen, defaults.pics_per_screen);
    assert_eq!(config.panorama.max_pics, defaults.max_pics);
    assert_eq!(config.panorama.target_angle_deg, defaults.target_angle_deg);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}
