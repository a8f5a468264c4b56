use arbor_config::{load_for_workspace, ArborConfig, ConfigError, DEFAULT_MAX_FRAME_LEN};
use std::path::PathBuf;

#[test]
fn empty_config_uses_defaults() {
    let config = ArborConfig::from_toml_str("").unwrap();
    assert_eq!(config, ArborConfig::default());
    assert_eq!(config.logging.level, "info");
    assert!(config.logging.stderr);
    assert!(config.storage.enabled);
    assert_eq!(config.storage.root, None);
    assert_eq!(config.sync.max_frame_len, DEFAULT_MAX_FRAME_LEN);
}

#[test]
fn every_section_is_parsed() {
    let config = ArborConfig::from_toml_str(
        r#"
        [logging]
        level = "arbor.sync=debug"
        json = true
        stderr = false
        file = "/tmp/arbor.log"

        [storage]
        enabled = false
        root = "/var/cache/arbor"

        [sync]
        max_frame_len = 1048576
        "#,
    )
    .unwrap();

    assert_eq!(config.logging.level, "arbor.sync=debug");
    assert!(config.logging.json);
    assert!(!config.logging.stderr);
    assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/arbor.log")));
    assert!(!config.storage.enabled);
    assert_eq!(config.storage.root, Some(PathBuf::from("/var/cache/arbor")));
    assert_eq!(config.sync.max_frame_len, 1024 * 1024);
}

#[test]
fn unknown_keys_are_rejected_without_echoing_input() {
    let err = ArborConfig::from_toml_str("[storage]\nsecret_token = \"hunter2\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)));
    assert!(!err.to_string().contains("hunter2"));
}

#[test]
fn workspace_config_is_discovered() {
    let tmp = tempfile::tempdir().unwrap();
    let (config, path) = load_for_workspace(tmp.path()).unwrap();
    assert_eq!(config, ArborConfig::default());
    assert_eq!(path, None);

    std::fs::write(tmp.path().join("arbor.toml"), "[storage]\nenabled = false\n").unwrap();
    let (config, path) = load_for_workspace(tmp.path()).unwrap();
    assert!(!config.storage.enabled);
    assert_eq!(path, Some(tmp.path().join("arbor.toml")));
}

#[test]
fn missing_file_reports_path() {
    let tmp = tempfile::tempdir().unwrap();
    let missing = tmp.path().join("nope.toml");
    let err = ArborConfig::load_from_path(&missing).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("nope.toml"));
}
