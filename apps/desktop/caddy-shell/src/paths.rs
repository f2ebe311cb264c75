//! Platform-aware detection of the shell's config and log directories.
//!
//! Lookup order:
//! 1. `CADDY_SHELL_HOME` environment variable (explicit override)
//! 2. Platform-specific directories via `dirs`

use crate::error::ShellError;

use common::ErrorLocation;

use std::env;
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::panic::Location;
use std::path::PathBuf;

use log::debug;

const HOME_OVERRIDE_VAR: &str = "CADDY_SHELL_HOME";
const APP_DIR_NAME: &str = "caddy-shell";
const LOG_DIR_NAME: &str = "logs";

#[derive(Debug, Clone)]
pub struct ShellPaths {
    /// Holds `bridge.toml`.
    pub config_dir: PathBuf,
    /// Holds the log file.
    pub log_dir: PathBuf,
    pub source: PathSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSource {
    EnvVar,
    PlatformDefault,
}

impl Display for PathSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        match self {
            PathSource::EnvVar => write!(f, "{HOME_OVERRIDE_VAR}"),
            PathSource::PlatformDefault => write!(f, "platform default"),
        }
    }
}

/// Detect the shell's directories. Nothing is created here.
///
/// # Errors
///
/// Returns [`ShellError::Shell`] if the platform reports no config or data directory.
pub fn detect_shell_paths() -> Result<ShellPaths, ShellError> {
    if let Ok(home) = env::var(HOME_OVERRIDE_VAR) {
        let home = PathBuf::from(home);
        debug!("Using {HOME_OVERRIDE_VAR} override: {}", home.display());

        return Ok(ShellPaths {
            config_dir: home.clone(),
            log_dir: home.join(LOG_DIR_NAME),
            source: PathSource::EnvVar,
        });
    }

    let config_dir = dirs::config_dir().ok_or_else(|| ShellError::Shell {
        message: format!("No config directory on this platform; set {HOME_OVERRIDE_VAR}"),
        location: ErrorLocation::from(Location::caller()),
    })?;
    let data_dir = dirs::data_local_dir().ok_or_else(|| ShellError::Shell {
        message: format!("No data directory on this platform; set {HOME_OVERRIDE_VAR}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    Ok(ShellPaths {
        config_dir: config_dir.join(APP_DIR_NAME),
        log_dir: data_dir.join(APP_DIR_NAME).join(LOG_DIR_NAME),
        source: PathSource::PlatformDefault,
    })
}
