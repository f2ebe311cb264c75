//! The shell's UI surface.
//!
//! Owns the surface transport and renders whatever comes back through it, command
//! replies and engine log lines alike, through an [`Output`] callback. All
//! rendering runs on the UI thread.

use crate::console::render_result;
use crate::error::ShellError;

use bridge_core::transport::{CommandResult, ListenerId, LogEvent, MethodCall, Transport};
use bridge_core::ui::UiContext;
use bridge_core::{COMMAND_CHANNEL, LOG_CHANNEL};

use common::ErrorLocation;

use std::collections::VecDeque;
use std::panic::Location;
use std::sync::Arc;

use log::{debug, info};

/// Where rendered lines go. `println!` in the binary, a buffer in tests.
pub type Output = Arc<dyn Fn(String) + Send + Sync>;

const LOG_LINE_PREFIX: &str = "[engine] ";

/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct Surface {
    transport: Transport,
    output: Output,
}

impl Surface {
    /// Open a surface whose replies are delivered through `ui`.
    pub fn open(ui: UiContext, output: Output) -> Self {
        info!("Surface opened");
        Self {
            transport: Transport::new(ui),
            output,
        }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Write one line to the output.
    pub fn print(&self, line: impl Into<String>) {
        (self.output)(line.into());
    }

    /// Start printing engine log lines.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::Bridge`] if the log channel is not registered on this surface.
    pub fn subscribe_logs(&self) -> Result<ListenerId, ShellError> {
        let output = Arc::clone(&self.output);
        self.transport
            .listen(LOG_CHANNEL, move |event: LogEvent| {
                output(format!("{LOG_LINE_PREFIX}{event}"))
            })
            .map_err(|e| ShellError::Bridge {
                message: format!("Failed to subscribe to engine logs: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    /// Stop printing engine log lines. Returns whether a subscription existed.
    pub fn unsubscribe_logs(&self) -> bool {
        self.transport.cancel(LOG_CHANNEL)
    }

    /// Send `call` to the command channel and print the reply when it arrives.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::Bridge`] if the transport refuses the call.
    pub fn dispatch(&self, call: MethodCall) -> Result<(), ShellError> {
        self.dispatch_with(call, |_| {})
    }

    /// Like [`Surface::dispatch`], then runs `after` with the reply on the UI thread.
    pub fn dispatch_with<F>(&self, call: MethodCall, after: F) -> Result<(), ShellError>
    where
        F: FnOnce(&CommandResult) + Send + 'static,
    {
        let method = call.method.clone();
        let output = Arc::clone(&self.output);
        debug!("Dispatching '{method}'");

        self.transport
            .send_method_call(COMMAND_CHANNEL, call, move |result| {
                output(render_result(&method, &result));
                after(&result);
            })
            .map_err(|e| ShellError::Bridge {
                message: format!("Failed to send command: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    /// Dispatch `calls` one after another; each waits for the previous reply.
    ///
    /// Failures do not stop the sequence: a failed `setEnvironment` still lets
    /// the following `start` report its own outcome.
    pub fn dispatch_sequence(&self, mut calls: VecDeque<MethodCall>) -> Result<(), ShellError> {
        let Some(call) = calls.pop_front() else {
            return Ok(());
        };

        let next = self.clone();
        self.dispatch_with(call, move |_| {
            if let Err(e) = next.dispatch_sequence(calls) {
                next.print(e.to_string());
            }
        })
    }

    /// Tear the surface down. Late replies and log lines are dropped from here on.
    pub fn close(&self) {
        self.transport.destroy();
        info!("Surface closed");
    }
}
