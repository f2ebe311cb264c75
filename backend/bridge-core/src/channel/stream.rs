use crate::LOG_CHANNEL;
use crate::engine::LogSink;
use crate::transport::{EventSink, LogEvent, StreamHandler, Transport};

use std::sync::Arc;

use log::{debug, info, trace};
use parking_lot::Mutex;

/// Log event channel bound to one surface transport.
///
/// Holds at most one sink. `publish` may be called from any thread; it delivers
/// to the current sink or drops the event. Once `detach` returns, the old sink
/// receives nothing further.
pub struct EventStream {
    transport: Transport,
    slot: Arc<SinkSlot>,
}

struct SinkSlot {
    sink: Mutex<Option<Arc<dyn EventSink>>>,
}

impl EventStream {
    /// Register a stream handler on `transport`.
    pub fn register(transport: &Transport) -> Self {
        let slot = Arc::new(SinkSlot {
            sink: Mutex::new(None),
        });

        transport.set_stream_handler(
            LOG_CHANNEL,
            Some(Arc::clone(&slot) as Arc<dyn StreamHandler>),
        );
        info!("Event stream registered on {LOG_CHANNEL}");

        Self {
            transport: transport.clone(),
            slot,
        }
    }

    /// Install `sink`, replacing any current one.
    pub fn attach(&self, sink: Arc<dyn EventSink>) {
        self.slot.attach(sink);
    }

    /// Remove the current sink. No-op when none is attached.
    pub fn detach(&self) {
        self.slot.detach();
    }

    pub fn publish(&self, event: impl Into<LogEvent>) {
        self.slot.publish(event.into());
    }

    pub fn is_attached(&self) -> bool {
        self.slot.sink.lock().is_some()
    }

    /// Engine-facing sink that publishes into this stream.
    pub fn publisher(&self) -> LogSink {
        let slot = Arc::clone(&self.slot);
        Arc::new(move |event: LogEvent| slot.publish(event))
    }

    /// Clear the handler from the transport and drop the sink. Idempotent.
    pub fn dispose(&self) {
        self.transport.set_stream_handler(LOG_CHANNEL, None);
        self.slot.detach();
        debug!("Event stream disposed");
    }
}

impl SinkSlot {
    fn attach(&self, sink: Arc<dyn EventSink>) {
        if self.sink.lock().replace(sink).is_some() {
            debug!("Event sink replaced");
        } else {
            debug!("Event sink attached");
        }
    }

    fn detach(&self) {
        if self.sink.lock().take().is_some() {
            debug!("Event sink detached");
        }
    }

    // The lock is held across delivery so a returning `detach` fences the old
    // sink. Sinks must not call back into the stream.
    fn publish(&self, event: LogEvent) {
        let sink = self.sink.lock();
        match sink.as_ref() {
            Some(sink) => sink.success(event),
            None => trace!("No subscriber, dropped: {event}"),
        }
    }
}

impl StreamHandler for SinkSlot {
    fn on_listen(&self, sink: Arc<dyn EventSink>) {
        self.attach(sink);
    }

    fn on_cancel(&self) {
        self.detach();
    }
}
