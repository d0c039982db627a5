//! Tests for engine configuration.

use super::*;

#[test]
fn test_toml_parsing() {
    let toml = r#"
        assert_mode = "off"
        log_filter = "rosterforge_autocheck=debug"

        [auto_check]
        enabled = false
        skip_hidden = false
    "#;

    let config = EngineConfig::from_toml_str(toml).unwrap();
    assert_eq!(config.assert_mode, AssertMode::Off);
    assert_eq!(
        config.log_filter.as_deref(),
        Some("rosterforge_autocheck=debug")
    );
    assert!(!config.auto_check.enabled);
    assert!(!config.auto_check.skip_hidden);
    // Unlisted keys keep their defaults.
    assert!(!config.auto_check.allow_remove_units);
    assert_eq!(config.auto_check.yield_every, 1);
}

#[test]
fn test_yaml_parsing() {
    let yaml = r#"
        assert_mode: full
        auto_check:
          allow_remove_units: true
          yield_every: 4
    "#;

    let config = EngineConfig::from_yaml_str(yaml).unwrap();
    assert_eq!(config.assert_mode, AssertMode::Full);
    assert!(config.auto_check.enabled);
    assert!(config.auto_check.allow_remove_units);
    assert_eq!(config.auto_check.yield_every, 4);
    assert_eq!(config.log_filter, None);
}

#[test]
fn test_empty_document_is_default() {
    let config = EngineConfig::from_toml_str("").unwrap();
    assert_eq!(config, EngineConfig::default());
    assert_eq!(config.assert_mode, AssertMode::Leaks);
    assert!(config.auto_check.enabled);
    assert!(config.auto_check.skip_hidden);
}

#[test]
fn test_unknown_assert_mode_is_rejected() {
    let err = EngineConfig::from_toml_str(r#"assert_mode = "paranoid""#).unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)));
}

#[test]
fn test_zero_yield_every_is_invalid() {
    let err = EngineConfig::from_yaml_str("auto_check:\n  yield_every: 0\n").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(err.to_string().contains("yield_every"));
}

#[test]
fn test_builder() {
    let config = EngineConfig::new()
        .with_assert_mode(AssertMode::Full)
        .with_auto_check(AutoCheckConfig::default().with_allow_remove_units(true))
        .with_log_filter("rosterforge_scope=trace");

    assert_eq!(config.assert_mode, AssertMode::Full);
    assert!(config.auto_check.allow_remove_units);
    assert_eq!(config.log_filter.as_deref(), Some("rosterforge_scope=trace"));
    assert!(config.validate().is_ok());

    assert!(!AutoCheckConfig::disabled().enabled);
}

#[test]
fn test_load_picks_format_from_extension() {
    let dir = std::env::temp_dir().join(format!("rosterforge-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let yaml = dir.join("engine.yml");
    std::fs::write(&yaml, "assert_mode: \"off\"\n").unwrap();
    assert_eq!(EngineConfig::load(&yaml).unwrap().assert_mode, AssertMode::Off);

    let toml = dir.join("engine.toml");
    std::fs::write(&toml, "assert_mode = \"full\"\n").unwrap();
    assert_eq!(EngineConfig::load(&toml).unwrap().assert_mode, AssertMode::Full);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_missing_file_is_io_error() {
    let err = EngineConfig::load("/nonexistent/rosterforge.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}
