use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum TransportError {
    #[error("Missing Handler Error: {message} {location}")]
    MissingHandler {
        message: String,
        location: ErrorLocation,
    },

    #[error("Destroyed Error: {message} {location}")]
    Destroyed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Reply Dropped Error: {message} {location}")]
    ReplyDropped {
        message: String,
        location: ErrorLocation,
    },
}
