//! Configuration file and startup consistency checks

use proxalert::{AlertMode, AppConfig, ClassNames, OutputLayout, ProxError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

fn shipped(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(relative)
}

#[test]
fn test_shipped_config_matches_defaults() {
    let config = AppConfig::from_toml_file(&shipped("config_files/proxalert.toml")).unwrap();
    let defaults = AppConfig::default();

    assert_eq!(config.model.rows, defaults.model.rows);
    assert_eq!(config.model.dimensions, defaults.model.dimensions);
    assert_eq!(config.detection.nms_threshold, defaults.detection.nms_threshold);
    assert_eq!(config.alert.area_divisor, defaults.alert.area_divisor);
    assert_eq!(config.alert.mode, AlertMode::Queued);
    assert_eq!(config.alert.play_timeout_ms, None);
    assert_eq!(config.capture.window_name, "FRAME");
}

#[test]
fn test_shipped_class_list_fits_default_layout() {
    let classes = ClassNames::from_file(&shipped("config_files/classes.txt")).unwrap();
    assert_eq!(classes.len(), 80);
    assert_eq!(classes.label(0), "person");
    assert_eq!(classes.label(79), "toothbrush");

    let layout = OutputLayout::new(25200, 85).unwrap();
    assert!(layout.check_class_count(classes.len()).is_ok());
}

#[test]
fn test_class_count_mismatch_is_configuration_error() {
    let layout = OutputLayout::yolov5_coco();
    let err: ProxError = layout.check_class_count(79).unwrap_err().into();
    assert!(err.is_configuration());
}

#[test]
fn test_empty_class_list_is_rejected() {
    let file = NamedTempFile::new().unwrap();
    match ClassNames::from_file(file.path()) {
        Err(ProxError::ClassListError(path)) => assert_eq!(path, file.path()),
        other => panic!("Expected ClassListError, got {:?}", other),
    }
}

#[test]
fn test_malformed_toml_is_reported() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[alert\nmode = ").unwrap();

    let err: ProxError = AppConfig::from_toml_file(file.path()).unwrap_err().into();
    assert!(err.is_configuration());
}
