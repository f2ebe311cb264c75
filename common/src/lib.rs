//! Shared building blocks for the Caddy bridge workspace.
//!
//! ## Architecture
//!
//! - **common** (this crate): error location tracking and secret-safe values
//! - **bridge-core**: command channel, event stream, engine handle, host lifecycle
//! - **caddy-shell**: console surface wiring everything together
//!
//! Nothing in here knows about channels or engines, so every crate can depend on it.

pub mod error;
pub mod redacted_value;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use redacted_value::RedactedValue;
