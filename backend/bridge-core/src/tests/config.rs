use crate::config::BridgeConfig;
use crate::error::config::ConfigError;

use std::path::PathBuf;

use log::LevelFilter;
use serde_json::Value;
use tempfile::TempDir;

/// **VALUE**: Verifies a missing config file yields defaults rather than an error.
///
/// **WHY THIS MATTERS**: First launch has no config file. The shell must still start.
#[test]
fn given_empty_directory_when_loaded_then_returns_defaults() {
    // GIVEN: A directory without bridge.toml
    let dir = TempDir::new().unwrap();

    // WHEN: Loading
    let config = BridgeConfig::load(dir.path()).unwrap();

    // THEN: Defaults
    assert_eq!(config, BridgeConfig::default());
    assert_eq!(config.workers.max_blocking_threads, 16);
    assert!(!config.engine.auto_start);
}

/// **VALUE**: Verifies that a saved config loads back with every section intact.
///
/// **BUG THIS CATCHES**: Would catch a serde rename or a section that is written but not
/// read back (e.g. a missing `#[serde(default)]` turning into a parse error).
#[test]
fn given_saved_config_when_loaded_then_matches() {
    // GIVEN: A customised config saved to disk
    let dir = TempDir::new().unwrap();
    let mut config = BridgeConfig::default();
    config.engine.auto_start = true;
    config.engine.config_file = Some(PathBuf::from("/etc/caddy/caddy.json"));
    config.workers.max_blocking_threads = 4;
    config.logging.level = "warn".to_string();
    config.save(dir.path()).unwrap();

    // WHEN: Loading it back
    let loaded = BridgeConfig::load(dir.path()).unwrap();

    // THEN: Same values, and no temp file left behind
    assert_eq!(loaded, config);
    assert_eq!(loaded.level_filter(), LevelFilter::Warn);
    assert!(!dir.path().join("bridge.toml.tmp").exists());
}

/// **VALUE**: Verifies partial files fill the gaps with defaults.
#[test]
fn given_partial_file_when_loaded_then_missing_sections_default() {
    // GIVEN: A file with only a logging section
    let dir = TempDir::new().unwrap();
    std::fs::write(
        BridgeConfig::path(dir.path()),
        "[logging]\nlevel = \"trace\"\n",
    )
    .unwrap();

    // WHEN: Loading
    let config = BridgeConfig::load(dir.path()).unwrap();

    // THEN: Logging applied, everything else default
    assert_eq!(config.level_filter(), LevelFilter::Trace);
    assert_eq!(config.workers, BridgeConfig::default().workers);
    assert_eq!(config.version, 1);
}

/// **VALUE**: Verifies a corrupted file is reported instead of silently replaced.
///
/// **WHY THIS MATTERS**: Silently falling back would discard the user's engine settings
/// on the next save.
#[test]
fn given_corrupted_file_when_loaded_then_returns_parse_error() {
    // GIVEN: Invalid TOML
    let dir = TempDir::new().unwrap();
    std::fs::write(BridgeConfig::path(dir.path()), "[engine\nauto_start = ").unwrap();

    // WHEN: Loading
    let result = BridgeConfig::load(dir.path());

    // THEN: Parse error naming the file
    match result {
        Err(ConfigError::ParseError { path, .. }) => {
            assert_eq!(path, BridgeConfig::path(dir.path()))
        }
        other => panic!("Expected ParseError, got {other:?}"),
    }
}

/// **VALUE**: Verifies validation bounds on version, worker count and log level.
///
/// **BUG THIS CATCHES**: Would catch a zero-thread blocking pool (every command would hang)
/// or a typo'd level silently becoming Info.
#[test]
fn given_out_of_range_values_when_validated_then_returns_validation_error() {
    // GIVEN: Several invalid configs
    let mut zero_workers = BridgeConfig::default();
    zero_workers.workers.max_blocking_threads = 0;

    let mut too_many_workers = BridgeConfig::default();
    too_many_workers.workers.max_blocking_threads = 513;

    let mut bad_level = BridgeConfig::default();
    bad_level.logging.level = "loud".to_string();

    let mut bad_version = BridgeConfig::default();
    bad_version.version = 0;

    let mut empty_path = BridgeConfig::default();
    empty_path.engine.env_file = Some(PathBuf::new());

    // WHEN / THEN: Each fails validation
    for config in [zero_workers, too_many_workers, bad_level, bad_version, empty_path] {
        assert!(
            matches!(config.validate(), Err(ConfigError::ValidationError { .. })),
            "{config:?} should be invalid"
        );
    }
}

/// **VALUE**: Verifies the dotenv file is turned into a setEnvironment payload without
/// touching the process environment.
#[test]
fn given_env_file_when_loaded_then_returns_json_object() {
    // GIVEN: A dotenv file
    let dir = TempDir::new().unwrap();
    let env_path = dir.path().join("caddy.env");
    std::fs::write(
        &env_path,
        "# DNS provider\nCADDY_BRIDGE_TEST_TOKEN=abc123\nACME_EMAIL=\"ops@example.com\"\n",
    )
    .unwrap();
    let mut config = BridgeConfig::default();
    config.engine.env_file = Some(env_path);

    // WHEN: Loading the environment
    let payload = config.load_environment().unwrap().expect("env file is set");

    // THEN: A JSON object with both variables, process env untouched
    let value: Value = serde_json::from_str(&payload).unwrap();
    assert_eq!(value["CADDY_BRIDGE_TEST_TOKEN"], "abc123");
    assert_eq!(value["ACME_EMAIL"], "ops@example.com");
    assert!(std::env::var("CADDY_BRIDGE_TEST_TOKEN").is_err());
}

/// **VALUE**: Verifies missing engine files surface as read errors, and unset ones as `None`.
#[test]
fn given_missing_files_when_read_then_returns_read_error() {
    // GIVEN: A config pointing at files that do not exist
    let dir = TempDir::new().unwrap();
    let mut config = BridgeConfig::default();
    assert!(config.read_engine_config().unwrap().is_none());
    assert!(config.load_environment().unwrap().is_none());

    config.engine.config_file = Some(dir.path().join("missing.json"));
    config.engine.env_file = Some(dir.path().join("missing.env"));

    // WHEN / THEN: Both are read errors
    assert!(matches!(
        config.read_engine_config(),
        Err(ConfigError::ReadError { .. })
    ));
    assert!(matches!(
        config.load_environment(),
        Err(ConfigError::ReadError { .. })
    ));
}
