use common::ErrorLocation;

use serde::Serialize;
use thiserror::Error;

/// Errors raised by the shell itself.
///
/// Serializable so a front end can receive them as structured data rather
/// than opaque strings.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ShellError {
    /// Error from this app (startup, directories, logging)
    #[error("Shell Error: {message} {location}")]
    Shell {
        message: String,
        location: ErrorLocation,
    },

    /// Error from bridge-core (config, transport, engine teardown)
    #[error("Bridge Error: {message} {location}")]
    Bridge {
        message: String,
        location: ErrorLocation,
    },

    /// A console line that cannot be turned into a command
    #[error("Input Error: {message} {location}")]
    Input {
        message: String,
        location: ErrorLocation,
    },
}
