pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod transport;
pub mod ui;

#[cfg(test)]
mod tests;

/// Request/response channel carrying engine commands.
pub const COMMAND_CHANNEL: &str = "com.caddy_app/caddy";

/// Push channel carrying engine log lines.
pub const LOG_CHANNEL: &str = const_format::concatcp!(COMMAND_CHANNEL, "/logs");

/// Error code attached to every engine fault surfaced to the UI.
pub const ENGINE_ERROR_CODE: &str = "CADDY_ERROR";

/// Value used for `config` and `env` arguments when the caller omits them.
pub const EMPTY_JSON_OBJECT: &str = "{}";
