use crate::COMMAND_CHANNEL;
use crate::channel::command::Command;
use crate::engine::EngineSlot;
use crate::error::engine::EngineError;
use crate::transport::{CommandResult, MethodCall, MethodHandler, MethodResult, Transport};

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, error, info};
use tokio::runtime::Handle;

/// Command channel bound to one surface transport.
///
/// Registered on construction; [`CommandChannel::dispose`] clears the handler.
/// Commands already handed to a worker still complete and reply.
pub struct CommandChannel {
    transport: Transport,
    dispatcher: Arc<CommandDispatcher>,
}

struct CommandDispatcher {
    engine: Arc<EngineSlot>,
    workers: Handle,
    in_flight: Arc<AtomicUsize>,
}

impl CommandChannel {
    /// Register a command handler on `transport`.
    ///
    /// # Arguments
    ///
    /// * `transport` - Surface transport to register on
    /// * `engine` - Process-wide engine slot
    /// * `workers` - Runtime whose blocking pool executes engine calls
    pub fn register(transport: &Transport, engine: Arc<EngineSlot>, workers: Handle) -> Self {
        let dispatcher = Arc::new(CommandDispatcher {
            engine,
            workers,
            in_flight: Arc::new(AtomicUsize::new(0)),
        });

        transport.set_method_handler(
            COMMAND_CHANNEL,
            Some(Arc::clone(&dispatcher) as Arc<dyn MethodHandler>),
        );
        info!("Command channel registered on {COMMAND_CHANNEL}");

        Self {
            transport: transport.clone(),
            dispatcher,
        }
    }

    /// Number of commands currently executing on workers.
    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight.load(Ordering::SeqCst)
    }

    /// Clear the handler from the transport. Idempotent.
    pub fn dispose(&self) {
        self.transport.set_method_handler(COMMAND_CHANNEL, None);
        debug!(
            "Command channel disposed with {} command(s) in flight",
            self.in_flight()
        );
    }
}

impl MethodHandler for CommandDispatcher {
    fn on_method_call(&self, call: MethodCall, result: MethodResult) {
        let Some(command) = Command::from_call(&call) else {
            debug!("'{}' is not a known command", call.method);
            result.not_implemented();
            return;
        };

        let engine = Arc::clone(&self.engine);
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.fetch_add(1, Ordering::SeqCst);

        debug!("Scheduling '{}' on a worker", command.name());

        // If the runtime is shutting down the closure is dropped unrun and the
        // MethodResult drop path still answers the caller.
        self.workers.spawn_blocking(move || {
            let outcome = run_command(&engine, &command);
            in_flight.fetch_sub(1, Ordering::SeqCst);
            result.complete(outcome);
        });
    }
}

/// Execute `command` against the engine and fold every fault into a result.
pub(crate) fn run_command(engine: &EngineSlot, command: &Command) -> CommandResult {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let handle = engine.initialize();
        command.execute(handle.client())
    }));

    match outcome {
        Ok(Ok(payload)) => {
            debug!("'{}' completed: {payload}", command.name());
            CommandResult::Success(payload)
        }
        Ok(Err(EngineError::Unsupported { message, .. })) => {
            debug!("'{}' unsupported by engine: {message}", command.name());
            CommandResult::NotImplemented
        }
        Ok(Err(e)) => {
            error!("'{}' failed: {e}", command.name());
            CommandResult::engine_failure(failure_message(command, e.message()))
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!("'{}' panicked in the engine: {message}", command.name());
            CommandResult::engine_failure(failure_message(command, &message))
        }
    }
}

fn failure_message(command: &Command, message: &str) -> String {
    if message.trim().is_empty() {
        format!("{} failed without an error message", command.name())
    } else {
        message.to_string()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("engine panicked")
    }
}
