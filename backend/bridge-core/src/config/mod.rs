use crate::error::config::ConfigError;

use common::ErrorLocation;

use std::panic::Location;
use std::path::{Path, PathBuf};

use log::{LevelFilter, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const CONFIG_FILE_NAME: &str = "bridge.toml";
const CONFIG_VERSION: u32 = 1;
const MAX_BLOCKING_THREADS: usize = 512;

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// JSON engine config sent with `start` when `auto_start` is set.
    pub config_file: Option<PathBuf>,
    #[serde(default)]
    pub auto_start: bool,
    /// Dotenv file sent with `setEnvironment` before anything else.
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_max_blocking_threads")]
    pub max_blocking_threads: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_blocking_threads: default_max_blocking_threads(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub workers: WorkerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            engine: EngineConfig::default(),
            workers: WorkerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_max_blocking_threads() -> usize {
    16
}
fn default_level() -> String {
    if cfg!(debug_assertions) {
        "debug".to_string()
    } else {
        "info".to_string()
    }
}

// ============================================
// IMPLEMENTATION
// ============================================

impl BridgeConfig {
    /// Path of the config file inside `config_dir`.
    pub fn path(config_dir: &Path) -> PathBuf {
        config_dir.join(CONFIG_FILE_NAME)
    }

    /// Load config from {config_dir}/bridge.toml.
    ///
    /// # Returns
    ///
    /// Returns `Ok(BridgeConfig)` if loaded successfully or defaults if file missing.
    /// Returns `Err(ConfigError)` if file exists but is corrupted/invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = Self::path(config_dir);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: BridgeConfig = toml::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config TOML: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to {config_dir}/bridge.toml using atomic write.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation, directory creation, serialization,
    /// write or rename fails.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = Self::path(config_dir);
        let temp_path = config_dir.join(format!("{}.tmp", CONFIG_FILE_NAME));

        let contents = toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, contents).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{})",
                    self.version, CONFIG_VERSION
                ),
            });
        }

        if self.workers.max_blocking_threads == 0
            || self.workers.max_blocking_threads > MAX_BLOCKING_THREADS
        {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid max_blocking_threads: {} (must be 1-{})",
                    self.workers.max_blocking_threads, MAX_BLOCKING_THREADS
                ),
            });
        }

        if self.logging.level.parse::<LevelFilter>().is_err() {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!("Invalid log level: {}", self.logging.level),
            });
        }

        for (name, path) in [
            ("config_file", &self.engine.config_file),
            ("env_file", &self.engine.env_file),
        ] {
            if path.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
                return Err(ConfigError::ValidationError {
                    location: ErrorLocation::from(Location::caller()),
                    reason: format!("{name} cannot be an empty path"),
                });
            }
        }

        if self.engine.auto_start && self.engine.config_file.is_none() {
            warn!("auto_start is set without a config_file; the engine will start with an empty config");
        }

        Ok(())
    }

    /// Configured log level. Falls back to `Info` for an unparseable name.
    pub fn level_filter(&self) -> LevelFilter {
        self.logging.level.parse().unwrap_or(LevelFilter::Info)
    }

    /// Contents of `engine.config_file`, or `None` when unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the file cannot be read.
    pub fn read_engine_config(&self) -> Result<Option<String>, ConfigError> {
        let Some(path) = self.engine.config_file.as_ref() else {
            return Ok(None);
        };

        std::fs::read_to_string(path)
            .map(Some)
            .map_err(|e| ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: path.clone(),
                source: e,
            })
    }

    /// Variables from `engine.env_file` as a JSON object string, ready for
    /// `setEnvironment`. `None` when unset.
    ///
    /// The process environment is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the file cannot be opened and
    /// [`ConfigError::ParseError`] on a malformed line.
    pub fn load_environment(&self) -> Result<Option<String>, ConfigError> {
        let Some(path) = self.engine.env_file.as_ref() else {
            return Ok(None);
        };

        let entries = dotenvy::from_path_iter(path).map_err(|e| match e {
            dotenvy::Error::Io(source) => ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: path.clone(),
                source,
            },
            other => ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: path.clone(),
                reason: other.to_string(),
            },
        })?;

        let mut variables = Map::new();
        for entry in entries {
            let (key, value) = entry.map_err(|e| ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: path.clone(),
                reason: e.to_string(),
            })?;
            variables.insert(key, Value::String(value));
        }

        info!(
            "Loaded {} environment variable(s) from {}",
            variables.len(),
            path.display()
        );
        Ok(Some(Value::Object(variables).to_string()))
    }
}
