//! Bridge lifecycle owner.
//!
//! A [`BridgeHost`] lives as long as the application. Each time a UI surface
//! appears, [`BridgeHost::attach`] binds a fresh [`CommandChannel`] and
//! [`EventStream`] to its transport and routes engine logs into the stream.
//! [`BridgeHost::detach`] clears both handlers before the surface goes away.
//!
//! The engine itself is shared through an [`EngineSlot`] and is never touched
//! by attach or detach.

use crate::channel::{CommandChannel, EventStream};
use crate::engine::{EngineSlot, LogSink};
use crate::error::transport::TransportError;
use crate::transport::Transport;

use common::ErrorLocation;

use std::panic::Location;
use std::sync::Arc;

use log::{debug, info};
use tokio::runtime::Handle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Uninitialized,
    Attached,
    Detached,
}

struct Attachment {
    transport: Transport,
    commands: CommandChannel,
    logs: EventStream,
    publisher: LogSink,
}

/// Owner of the per-surface channel pair.
pub struct BridgeHost {
    engine: Arc<EngineSlot>,
    workers: Handle,
    state: HostState,
    attachment: Option<Attachment>,
}

impl BridgeHost {
    /// Create a host that has not yet seen a surface.
    ///
    /// # Arguments
    ///
    /// * `engine` - Process-wide engine slot, shared with any other host
    /// * `workers` - Runtime whose blocking pool executes commands
    pub fn new(engine: Arc<EngineSlot>, workers: Handle) -> Self {
        Self {
            engine,
            workers,
            state: HostState::Uninitialized,
            attachment: None,
        }
    }

    /// Bind both channels to `transport`.
    ///
    /// Attaching to the transport already bound is a no-op. Attaching to a
    /// different one detaches from the old transport first.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Destroyed`] if `transport` has already been destroyed.
    pub fn attach(&mut self, transport: &Transport) -> Result<(), TransportError> {
        if transport.is_destroyed() {
            return Err(TransportError::Destroyed {
                message: String::from("cannot attach the bridge to a destroyed surface"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if let Some(current) = self.attachment.as_ref() {
            if current.transport.ptr_eq(transport) {
                debug!("Bridge already attached to this surface");
                return Ok(());
            }
            info!("Bridge moving to a new surface");
            self.detach();
        }

        let commands = CommandChannel::register(
            transport,
            Arc::clone(&self.engine),
            self.workers.clone(),
        );
        let logs = EventStream::register(transport);
        let publisher = logs.publisher();
        self.engine.set_log_sink(Some(Arc::clone(&publisher)));

        self.attachment = Some(Attachment {
            transport: transport.clone(),
            commands,
            logs,
            publisher,
        });
        self.state = HostState::Attached;

        info!("Bridge attached");
        Ok(())
    }

    /// Clear both handlers and stop routing engine logs. No-op unless attached.
    ///
    /// Engine logs are only unrouted while they still point at this host's
    /// stream; another host that attached later to the same engine keeps them.
    pub fn detach(&mut self) {
        let Some(attachment) = self.attachment.take() else {
            return;
        };

        attachment.commands.dispose();
        attachment.logs.dispose();
        if !self.engine.clear_log_sink_if(&attachment.publisher) {
            debug!("Engine logs already routed to another surface");
        }
        drop(attachment.transport);

        self.state = HostState::Detached;
        info!("Bridge detached");
    }

    pub fn state(&self) -> HostState {
        self.state
    }

    pub fn engine(&self) -> &Arc<EngineSlot> {
        &self.engine
    }

    pub fn command_channel(&self) -> Option<&CommandChannel> {
        self.attachment.as_ref().map(|a| &a.commands)
    }

    pub fn event_stream(&self) -> Option<&EventStream> {
        self.attachment.as_ref().map(|a| &a.logs)
    }
}

impl Drop for BridgeHost {
    fn drop(&mut self) {
        self.detach();
    }
}
