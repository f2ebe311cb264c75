use crate::error::transport::TransportError;
use crate::transport::handler::{MethodHandler, StreamHandler};
use crate::transport::message::{CommandResult, ListenerId, LogEvent, MethodCall};
use crate::transport::reply::MethodResult;
use crate::transport::sink::TransportSink;
use crate::ui::UiContext;

use common::ErrorLocation;

use std::collections::HashMap;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, trace, warn};
use parking_lot::Mutex;
use tokio::sync::oneshot;

type ListenerCallback = Arc<Mutex<Box<dyn FnMut(LogEvent) + Send + 'static>>>;

struct Listener {
    id: ListenerId,
    on_event: ListenerCallback,
}

/// Handler registry and UI-side entry points for one UI surface.
///
/// Cloning yields another reference to the same surface transport.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<TransportInner>,
}

pub(super) struct TransportInner {
    ui: UiContext,
    method_handlers: Mutex<HashMap<String, Arc<dyn MethodHandler>>>,
    stream_handlers: Mutex<HashMap<String, Arc<dyn StreamHandler>>>,
    listeners: Mutex<HashMap<String, Listener>>,
    destroyed: AtomicBool,
}

impl Transport {
    /// Create a transport whose replies and events are delivered through `ui`.
    pub fn new(ui: UiContext) -> Self {
        Self {
            inner: Arc::new(TransportInner {
                ui,
                method_handlers: Mutex::new(HashMap::new()),
                stream_handlers: Mutex::new(HashMap::new()),
                listeners: Mutex::new(HashMap::new()),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    pub fn ui(&self) -> &UiContext {
        &self.inner.ui
    }

    /// Register (`Some`) or clear (`None`) the handler for a method channel.
    pub fn set_method_handler(&self, channel: &str, handler: Option<Arc<dyn MethodHandler>>) {
        let mut handlers = self.inner.method_handlers.lock();
        match handler {
            Some(handler) => {
                if self.is_destroyed() {
                    warn!("Ignoring method handler for {channel}: transport destroyed");
                    return;
                }
                if handlers.insert(channel.to_string(), handler).is_some() {
                    debug!("Replaced method handler on {channel}");
                }
            }
            None => {
                if handlers.remove(channel).is_some() {
                    debug!("Cleared method handler on {channel}");
                }
            }
        }
    }

    /// Register (`Some`) or clear (`None`) the handler for an event channel.
    pub fn set_stream_handler(&self, channel: &str, handler: Option<Arc<dyn StreamHandler>>) {
        let mut handlers = self.inner.stream_handlers.lock();
        match handler {
            Some(handler) => {
                if self.is_destroyed() {
                    warn!("Ignoring stream handler for {channel}: transport destroyed");
                    return;
                }
                if handlers.insert(channel.to_string(), handler).is_some() {
                    debug!("Replaced stream handler on {channel}");
                }
            }
            None => {
                if handlers.remove(channel).is_some() {
                    debug!("Cleared stream handler on {channel}");
                }
            }
        }
    }

    pub fn has_method_handler(&self, channel: &str) -> bool {
        self.inner.method_handlers.lock().contains_key(channel)
    }

    pub fn has_stream_handler(&self, channel: &str) -> bool {
        self.inner.stream_handlers.lock().contains_key(channel)
    }

    /// Send `call` to the handler on `channel`; `reply` runs on the UI thread
    /// with the outcome.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Destroyed`] if the transport was torn down
    /// - [`TransportError::MissingHandler`] if nothing is registered on `channel`
    #[track_caller]
    pub fn send_method_call<F>(
        &self,
        channel: &str,
        call: MethodCall,
        reply: F,
    ) -> Result<(), TransportError>
    where
        F: FnOnce(CommandResult) + Send + 'static,
    {
        if self.is_destroyed() {
            return Err(TransportError::Destroyed {
                message: format!("Cannot send '{}' on {channel}", call.method),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let handler = self
            .inner
            .method_handlers
            .lock()
            .get(channel)
            .cloned()
            .ok_or_else(|| TransportError::MissingHandler {
                message: format!("No method handler registered on {channel}"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        trace!("Sending '{}' on {channel}", call.method);

        let result = MethodResult::new(
            call.method.clone(),
            self.inner.ui.clone(),
            Arc::downgrade(&self.inner),
            Box::new(reply),
        );
        handler.on_method_call(call, result);

        Ok(())
    }

    /// Send `call` and wait for its outcome.
    ///
    /// The reply is delivered through the UI queue, so the awaiting code must be
    /// running on the UI thread while the [`UiLoop`](crate::ui::UiLoop) is driven,
    /// e.g. inside [`UiLoop::run_until`](crate::ui::UiLoop::run_until).
    ///
    /// # Errors
    ///
    /// Same as [`Transport::send_method_call`], plus [`TransportError::ReplyDropped`]
    /// when the reply was absorbed by a teardown.
    pub async fn invoke_method(
        &self,
        channel: &str,
        call: MethodCall,
    ) -> Result<CommandResult, TransportError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let method = call.method.clone();

        self.send_method_call(channel, call, move |result| {
            let _ = reply_tx.send(result);
        })?;

        reply_rx.await.map_err(|_| TransportError::ReplyDropped {
            message: format!("Reply to '{method}' on {channel} never arrived"),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Subscribe to an event channel. `on_event` runs on the UI thread.
    ///
    /// A second `listen` on the same channel replaces the first subscription.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Destroyed`] if the transport was torn down
    /// - [`TransportError::MissingHandler`] if nothing is registered on `channel`
    #[track_caller]
    pub fn listen<F>(&self, channel: &str, on_event: F) -> Result<ListenerId, TransportError>
    where
        F: FnMut(LogEvent) + Send + 'static,
    {
        if self.is_destroyed() {
            return Err(TransportError::Destroyed {
                message: format!("Cannot listen on {channel}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let handler = self
            .inner
            .stream_handlers
            .lock()
            .get(channel)
            .cloned()
            .ok_or_else(|| TransportError::MissingHandler {
                message: format!("No stream handler registered on {channel}"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        let id = ListenerId::new();
        let listener = Listener {
            id,
            on_event: Arc::new(Mutex::new(Box::new(on_event))),
        };

        if let Some(previous) = self
            .inner
            .listeners
            .lock()
            .insert(channel.to_string(), listener)
        {
            debug!("Listener {} on {channel} replaced by {id}", previous.id);
        }

        let sink = TransportSink::new(
            channel,
            id,
            self.inner.ui.clone(),
            Arc::downgrade(&self.inner),
        );
        handler.on_listen(Arc::new(sink));

        info!("Listener {id} subscribed to {channel}");
        Ok(id)
    }

    /// Drop the subscription on `channel`. Returns whether one existed.
    pub fn cancel(&self, channel: &str) -> bool {
        let Some(listener) = self.inner.listeners.lock().remove(channel) else {
            trace!("Cancel on {channel} with no listener");
            return false;
        };

        let handler = self.inner.stream_handlers.lock().get(channel).cloned();
        if let Some(handler) = handler {
            handler.on_cancel();
        }

        info!("Listener {} cancelled on {channel}", listener.id);
        true
    }

    /// Tear the surface down.
    ///
    /// Handlers should already have been cleared by their owners; any that are
    /// still registered are cancelled and dropped here. Idempotent.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        let listeners: Vec<String> = self.inner.listeners.lock().drain().map(|(k, _)| k).collect();
        let stream_handlers: Vec<(String, Arc<dyn StreamHandler>)> =
            self.inner.stream_handlers.lock().drain().collect();
        let method_handlers: Vec<String> = self
            .inner
            .method_handlers
            .lock()
            .drain()
            .map(|(k, _)| k)
            .collect();

        for (channel, handler) in &stream_handlers {
            warn!("Stream handler on {channel} still registered at transport teardown");
            if listeners.contains(channel) {
                handler.on_cancel();
            }
        }
        for channel in &method_handlers {
            warn!("Method handler on {channel} still registered at transport teardown");
        }

        info!("Transport destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.is_destroyed()
    }

    /// Whether both values refer to the same surface transport.
    pub fn ptr_eq(&self, other: &Transport) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl TransportInner {
    pub(super) fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Runs on the UI thread. Drops events for cancelled or replaced listeners.
    pub(super) fn deliver_event(&self, channel: &str, id: ListenerId, event: LogEvent) {
        if self.is_destroyed() {
            trace!("Absorbed event on {channel}: transport destroyed");
            return;
        }

        let on_event = match self.listeners.lock().get(channel) {
            Some(listener) if listener.id == id => Arc::clone(&listener.on_event),
            _ => {
                trace!("Absorbed event on {channel} for stale listener {id}");
                return;
            }
        };

        let mut callback = on_event.lock();
        (*callback)(event);
    }
}
