//! The two bridge channels.
//!
//! - [`CommandChannel`]: method channel on [`COMMAND_CHANNEL`](crate::COMMAND_CHANNEL).
//!   Each call runs on a blocking worker and resolves exactly once on the UI thread.
//! - [`EventStream`]: event channel on [`LOG_CHANNEL`](crate::LOG_CHANNEL).
//!   Live tail of engine log lines for at most one subscriber; nothing is buffered.

mod command;
mod method;
mod stream;

pub use command::{Command, names};
pub use method::CommandChannel;
pub use stream::EventStream;

pub(crate) use method::run_command;
