//! Test helpers for bridge integration tests.
//!
//! - [`Harness`]: UI loop on the test thread, one surface transport, an attached host
//! - [`ScriptedEngine`]: engine fake that records calls and can be gated or made to fail
//! - [`Gate`]: blocks engine calls until the test opens it

use bridge_core::COMMAND_CHANNEL;
use bridge_core::LOG_CHANNEL;
use bridge_core::engine::{BridgeClient, EngineSlot, LogSink};
use bridge_core::error::engine::EngineError;
use bridge_core::host::BridgeHost;
use bridge_core::transport::{CommandResult, LogEvent, MethodCall, Transport};
use bridge_core::ui::{self, UiContext, UiLoop};

use common::ErrorLocation;

use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use tokio::runtime::Handle;

pub const DRIVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Latch that parks engine calls until opened.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    changed: Condvar,
}

impl Gate {
    pub fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.changed.wait(open).unwrap();
        }
    }

    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.changed.notify_all();
    }
}

/// Engine fake. Records every call as `"name(arg)"` along with the calling thread.
#[derive(Default)]
pub struct ScriptedEngine {
    pub calls: Mutex<Vec<(String, ThreadId)>>,
    pub fail_stop: Option<String>,
    pub status_gate: Option<Arc<Gate>>,
    pub stop_gate: Option<Arc<Gate>>,
    pub running: AtomicBool,
    pub sink: Mutex<Option<LogSink>>,
}

impl ScriptedEngine {
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(call, _)| call.clone())
            .collect()
    }

    pub fn call_threads(&self) -> Vec<ThreadId> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    /// Emit a line through the installed sink, as the engine's own threads would.
    pub fn emit(&self, line: &str) {
        let sink = self.sink.lock().unwrap().clone();
        if let Some(sink) = sink {
            sink(LogEvent::from(line));
        }
    }

    pub fn has_sink(&self) -> bool {
        self.sink.lock().unwrap().is_some()
    }

    fn record(&self, call: String) {
        self.calls
            .lock()
            .unwrap()
            .push((call, thread::current().id()));
    }

    fn status(&self) -> String {
        if self.running.load(Ordering::SeqCst) {
            String::from("running")
        } else {
            String::from("stopped")
        }
    }
}

impl BridgeClient for ScriptedEngine {
    fn start_engine(&self, config: &str) -> Result<String, EngineError> {
        self.record(format!("start({config})"));
        self.running.store(true, Ordering::SeqCst);
        Ok(self.status())
    }

    fn stop_engine(&self) -> Result<String, EngineError> {
        self.record(String::from("stop()"));
        if let Some(gate) = &self.stop_gate {
            gate.wait();
        }
        if let Some(message) = &self.fail_stop {
            return Err(EngineError::Fault {
                message: message.clone(),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        self.running.store(false, Ordering::SeqCst);
        Ok(self.status())
    }

    fn reload_engine(&self, config: &str) -> Result<String, EngineError> {
        self.record(format!("reload({config})"));
        Ok(self.status())
    }

    fn get_status(&self) -> Result<String, EngineError> {
        self.record(String::from("status()"));
        if let Some(gate) = &self.status_gate {
            gate.wait();
        }
        Ok(self.status())
    }

    fn set_environment(&self, env: &str) -> Result<String, EngineError> {
        self.record(format!("setEnvironment({env})"));
        Ok(self.status())
    }

    fn set_log_sink(&self, sink: Option<LogSink>) {
        *self.sink.lock().unwrap() = sink;
    }
}

/// Slot whose factory always hands out `engine`.
pub fn slot_for(engine: Arc<impl BridgeClient + 'static>) -> Arc<EngineSlot> {
    Arc::new(EngineSlot::new(move || {
        Arc::clone(&engine) as Arc<dyn BridgeClient>
    }))
}

/// One UI surface with the bridge attached. Must be created inside a tokio runtime.
pub struct Harness {
    pub ui_loop: UiLoop,
    pub context: UiContext,
    pub transport: Transport,
    pub host: BridgeHost,
}

impl Harness {
    pub fn new(engine: Arc<EngineSlot>) -> Self {
        let (context, ui_loop) = ui::channel();
        let transport = Transport::new(context.clone());
        let mut host = BridgeHost::new(engine, Handle::current());
        host.attach(&transport).expect("attach to a live transport");

        Self {
            ui_loop,
            context,
            transport,
            host,
        }
    }

    /// Create a second surface on the same UI thread.
    pub fn new_transport(&self) -> Transport {
        Transport::new(self.context.clone())
    }

    /// Invoke a command and drive the UI loop until its reply arrives.
    pub async fn invoke(&mut self, call: MethodCall) -> CommandResult {
        let transport = self.transport.clone();
        let reply = self
            .ui_loop
            .run_until(async move { transport.invoke_method(COMMAND_CHANNEL, call).await });

        tokio::time::timeout(DRIVE_TIMEOUT, reply)
            .await
            .expect("reply within timeout")
            .expect("transport delivers a reply")
    }

    /// Subscribe to the log channel; returns the lines seen on the UI thread.
    pub fn listen_logs(&self) -> Arc<Mutex<Vec<String>>> {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&lines);
        self.transport
            .listen(LOG_CHANNEL, move |event: LogEvent| {
                captured.lock().unwrap().push(event.into_string())
            })
            .expect("log channel is registered");
        lines
    }

    /// Drive the UI loop until `done` returns true.
    ///
    /// # Panics
    ///
    /// Panics after [`DRIVE_TIMEOUT`].
    pub async fn drive_until(&mut self, mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + DRIVE_TIMEOUT;
        while !done() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            self.ui_loop
                .run_until(tokio::time::sleep(Duration::from_millis(5)))
                .await;
        }
    }

    /// Keep the UI loop running for `duration` so late deliveries get a chance to land.
    pub async fn settle(&mut self, duration: Duration) {
        self.ui_loop.run_until(tokio::time::sleep(duration)).await;
    }
}
