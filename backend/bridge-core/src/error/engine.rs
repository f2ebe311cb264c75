use common::ErrorLocation;

use thiserror::Error as ThisError;

/// Faults raised by a [`BridgeClient`](crate::engine::BridgeClient) operation.
///
/// The command channel turns every variant except [`EngineError::Unsupported`]
/// into a `CADDY_ERROR` failure carrying [`EngineError::message`].
#[derive(Debug, ThisError)]
pub enum EngineError {
    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },

    #[error("Environment Error: {message} {location}")]
    Environment {
        message: String,
        location: ErrorLocation,
    },

    #[error("State Error: {message} {location}")]
    State {
        message: String,
        location: ErrorLocation,
    },

    #[error("Engine Error: {message} {location}")]
    Fault {
        message: String,
        location: ErrorLocation,
    },

    #[error("Unsupported Error: {message} {location}")]
    Unsupported {
        message: String,
        location: ErrorLocation,
    },
}

impl EngineError {
    /// Message without the variant prefix or location, as shown to the UI.
    pub fn message(&self) -> &str {
        match self {
            EngineError::Config { message, .. }
            | EngineError::Environment { message, .. }
            | EngineError::State { message, .. }
            | EngineError::Fault { message, .. }
            | EngineError::Unsupported { message, .. } => message,
        }
    }
}
