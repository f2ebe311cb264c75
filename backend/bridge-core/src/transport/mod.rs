//! Messaging transport between the UI surface and native handlers.
//!
//! A [`Transport`] belongs to one UI surface. Native code registers handlers on
//! named channels; UI code sends method calls and subscribes to event channels:
//!
//! - Method channels: request/response. Each call gets one [`MethodResult`],
//!   which posts its outcome back onto the UI context exactly once.
//! - Event channels: push. A subscription hands the [`StreamHandler`] an
//!   [`EventSink`]; events pushed into it are posted to the UI listener.
//!
//! # Teardown
//!
//! Once [`Transport::destroy`] runs (or the last reference is dropped), replies
//! and events still in flight are absorbed on the UI thread instead of being
//! delivered into a surface that no longer exists.

mod handler;
mod message;
mod messenger;
mod reply;
mod sink;

pub use handler::{EventSink, MethodHandler, StreamHandler};
pub use message::{CommandFailure, CommandResult, ListenerId, LogEvent, MethodCall};
pub use messenger::Transport;
pub use reply::MethodResult;
