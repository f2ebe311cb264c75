use crate::transport::handler::EventSink;
use crate::transport::message::{ListenerId, LogEvent};
use crate::transport::messenger::TransportInner;
use crate::ui::UiContext;

use std::sync::{Arc, Weak};

use log::trace;

/// Sink handed to a stream handler for one subscription.
pub(super) struct TransportSink {
    channel: Arc<str>,
    listener: ListenerId,
    ui: UiContext,
    transport: Weak<TransportInner>,
}

impl TransportSink {
    pub(super) fn new(
        channel: &str,
        listener: ListenerId,
        ui: UiContext,
        transport: Weak<TransportInner>,
    ) -> Self {
        Self {
            channel: Arc::from(channel),
            listener,
            ui,
            transport,
        }
    }
}

impl EventSink for TransportSink {
    fn success(&self, event: LogEvent) {
        let channel = Arc::clone(&self.channel);
        let listener = self.listener;
        let transport = self.transport.clone();

        let posted = self.ui.post(move || match transport.upgrade() {
            Some(inner) => inner.deliver_event(&channel, listener, event),
            None => trace!("Absorbed event on {channel}: transport dropped"),
        });

        if !posted {
            trace!("Absorbed event on {}: UI loop gone", self.channel);
        }
    }
}
