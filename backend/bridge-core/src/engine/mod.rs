//! Engine collaborator seam.
//!
//! The bridge never looks inside the engine. It needs five synchronous control
//! operations and a place to plug a log sink, described by [`BridgeClient`].
//! [`EngineSlot`] owns the process-wide instance; [`LocalEngine`] is the
//! in-process implementation used by the shell and by tests.

mod handle;
pub(crate) mod local;

pub use handle::{EngineHandle, EngineSlot};
pub use local::LocalEngine;

use crate::error::engine::EngineError;
use crate::transport::LogEvent;

use common::ErrorLocation;

use std::panic::Location;
use std::sync::Arc;

/// Callback the engine invokes for every log line, from any thread.
pub type LogSink = Arc<dyn Fn(LogEvent) + Send + Sync>;

/// Control surface of the embedded server engine.
///
/// Every method is blocking and is only ever called from worker threads.
/// Implementations serialize their own state; the bridge adds no locking.
pub trait BridgeClient: Send + Sync {
    fn start_engine(&self, config: &str) -> Result<String, EngineError>;

    fn stop_engine(&self) -> Result<String, EngineError>;

    fn reload_engine(&self, config: &str) -> Result<String, EngineError>;

    fn get_status(&self) -> Result<String, EngineError>;

    /// Engines without environment support keep this default, which the command
    /// channel reports as "not implemented".
    fn set_environment(&self, env: &str) -> Result<String, EngineError> {
        let _ = env;
        Err(EngineError::Unsupported {
            message: String::from("setEnvironment is not supported by this engine"),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Install (`Some`) or remove (`None`) the log sink.
    fn set_log_sink(&self, sink: Option<LogSink>);
}
