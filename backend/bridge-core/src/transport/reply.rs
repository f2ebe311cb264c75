use crate::transport::message::{CommandFailure, CommandResult};
use crate::transport::messenger::TransportInner;
use crate::ui::UiContext;

use std::sync::Weak;

use log::{debug, warn};

type Reply = Box<dyn FnOnce(CommandResult) + Send + 'static>;

/// Single-shot reply for one method call.
///
/// Consumed by `success`, `error`, `not_implemented`, or `complete`, any of
/// which may be called from any thread; the outcome is posted to the UI thread.
/// Dropping it unanswered still resolves the call, with a `CADDY_ERROR` failure.
pub struct MethodResult {
    method: String,
    ui: UiContext,
    transport: Weak<TransportInner>,
    reply: Option<Reply>,
}

impl MethodResult {
    pub(super) fn new(
        method: String,
        ui: UiContext,
        transport: Weak<TransportInner>,
        reply: Reply,
    ) -> Self {
        Self {
            method,
            ui,
            transport,
            reply: Some(reply),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn success(self, payload: impl Into<String>) {
        self.complete(CommandResult::Success(payload.into()));
    }

    pub fn error(self, code: impl Into<String>, message: impl Into<String>) {
        self.complete(CommandResult::Failure(CommandFailure {
            code: code.into(),
            message: message.into(),
        }));
    }

    pub fn not_implemented(self) {
        self.complete(CommandResult::NotImplemented);
    }

    pub fn complete(mut self, result: CommandResult) {
        if let Some(reply) = self.reply.take() {
            self.post(reply, result);
        }
    }

    fn post(&self, reply: Reply, result: CommandResult) {
        let transport = self.transport.clone();
        let method = self.method.clone();

        let posted = self.ui.post(move || match transport.upgrade() {
            Some(inner) if !inner.is_destroyed() => reply(result),
            _ => debug!("Absorbed '{method}' reply: transport torn down"),
        });

        if !posted {
            debug!("Absorbed '{}' reply: UI loop gone", self.method);
        }
    }
}

impl Drop for MethodResult {
    fn drop(&mut self) {
        if let Some(reply) = self.reply.take() {
            warn!("'{}' dropped without a reply", self.method);
            let failure =
                CommandResult::engine_failure(format!("'{}' finished without a result", self.method));
            self.post(reply, failure);
        }
    }
}
