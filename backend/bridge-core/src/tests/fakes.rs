// Engines with scripted faults for dispatch tests.

use crate::engine::{BridgeClient, LogSink};
use crate::error::engine::EngineError;

use common::ErrorLocation;

use std::panic::Location;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub struct FaultyEngine {
    pub stop_message: String,
    pub calls: AtomicUsize,
}

impl FaultyEngine {
    pub fn failing_stop(message: &str) -> Self {
        Self {
            stop_message: message.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl BridgeClient for FaultyEngine {
    fn start_engine(&self, config: &str) -> Result<String, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("started with {config}"))
    }

    fn stop_engine(&self) -> Result<String, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(EngineError::Fault {
            message: self.stop_message.clone(),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    fn reload_engine(&self, _config: &str) -> Result<String, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        panic!("reload exploded");
    }

    fn get_status(&self) -> Result<String, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(String::from("idle"))
    }

    fn set_log_sink(&self, _sink: Option<LogSink>) {}
}
