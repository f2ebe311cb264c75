use crate::transport::message::{LogEvent, MethodCall};
use crate::transport::reply::MethodResult;

use std::sync::Arc;

/// Native side of a method channel.
///
/// Called on the UI thread. Implementations must not block: hand the work to a
/// worker and complete `result` from there.
pub trait MethodHandler: Send + Sync {
    fn on_method_call(&self, call: MethodCall, result: MethodResult);
}

/// Native side of an event channel.
pub trait StreamHandler: Send + Sync {
    /// A listener subscribed. `sink` replaces any sink handed out earlier.
    fn on_listen(&self, sink: Arc<dyn EventSink>);

    /// The listener went away.
    fn on_cancel(&self);
}

/// Receiver of pushed events. May be called from any thread and must return quickly.
pub trait EventSink: Send + Sync {
    fn success(&self, event: LogEvent);
}

impl<F> EventSink for F
where
    F: Fn(LogEvent) + Send + Sync,
{
    fn success(&self, event: LogEvent) {
        self(event)
    }
}
