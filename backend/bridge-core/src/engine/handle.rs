use crate::engine::{BridgeClient, LogSink, LocalEngine};
use crate::error::engine::EngineError;

use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;

type EngineFactory = Box<dyn Fn() -> Arc<dyn BridgeClient> + Send + Sync>;

/// Shared reference to the engine instance.
#[derive(Clone)]
pub struct EngineHandle {
    client: Arc<dyn BridgeClient>,
}

impl EngineHandle {
    pub fn client(&self) -> &dyn BridgeClient {
        self.client.as_ref()
    }

    /// Whether both handles refer to the same engine instance.
    pub fn ptr_eq(&self, other: &EngineHandle) -> bool {
        Arc::ptr_eq(&self.client, &other.client)
    }
}

/// Owner of the process-wide engine.
///
/// The engine is created lazily by [`EngineSlot::initialize`] and lives until
/// [`EngineSlot::teardown`], independent of any UI surface. Share one slot
/// (behind an `Arc`) between every host in the process.
///
/// Lock order: `handle` before `log_sink`.
pub struct EngineSlot {
    factory: EngineFactory,
    handle: Mutex<Option<EngineHandle>>,
    log_sink: Mutex<Option<LogSink>>,
}

impl EngineSlot {
    /// Create an empty slot that builds engines with `factory`.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Arc<dyn BridgeClient> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            handle: Mutex::new(None),
            log_sink: Mutex::new(None),
        }
    }

    /// Slot backed by [`LocalEngine`].
    pub fn local() -> Self {
        Self::new(|| Arc::new(LocalEngine::new()) as Arc<dyn BridgeClient>)
    }

    /// Return the engine handle, creating it on first use.
    ///
    /// Idempotent: concurrent callers all receive the same instance.
    pub fn initialize(&self) -> EngineHandle {
        let mut slot = self.handle.lock();

        if let Some(handle) = slot.as_ref() {
            return handle.clone();
        }

        let client = (self.factory)();
        client.set_log_sink(self.log_sink.lock().clone());

        let handle = EngineHandle { client };
        *slot = Some(handle.clone());

        info!("Engine handle created");
        handle
    }

    /// Current handle, without creating one.
    pub fn get(&self) -> Option<EngineHandle> {
        self.handle.lock().clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Route engine log lines to `sink`, or stop routing with `None`.
    ///
    /// Remembered across engine creation, so it can be set before the first start.
    pub fn set_log_sink(&self, sink: Option<LogSink>) {
        let slot = self.handle.lock();
        *self.log_sink.lock() = sink.clone();

        if let Some(handle) = slot.as_ref() {
            handle.client.set_log_sink(sink);
        }
    }

    /// Stop routing engine log lines, but only if `sink` is the one installed.
    ///
    /// Returns whether the sink was cleared. Hosts sharing one slot use this so
    /// a host detaching late does not unroute a newer host's stream.
    pub fn clear_log_sink_if(&self, sink: &LogSink) -> bool {
        let slot = self.handle.lock();
        let mut current = self.log_sink.lock();

        if !current.as_ref().is_some_and(|installed| Arc::ptr_eq(installed, sink)) {
            return false;
        }

        *current = None;
        if let Some(handle) = slot.as_ref() {
            handle.client.set_log_sink(None);
        }
        true
    }

    /// Stop the engine and release the handle. The next `initialize` builds a new one.
    ///
    /// # Errors
    ///
    /// Returns the engine's fault if stopping failed; the handle is released anyway.
    pub fn teardown(&self) -> Result<(), EngineError> {
        let Some(handle) = self.handle.lock().take() else {
            debug!("Engine teardown requested but no engine was created");
            return Ok(());
        };

        handle.client.set_log_sink(None);

        match handle.client.stop_engine() {
            Ok(status) => {
                info!("Engine torn down: {status}");
                Ok(())
            }
            Err(e) => {
                warn!("Engine teardown failed to stop the engine: {e}");
                Err(e)
            }
        }
    }
}
