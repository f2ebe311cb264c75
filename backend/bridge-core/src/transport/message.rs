use crate::ENGINE_ERROR_CODE;

use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FormatResult};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A method invocation as it crosses the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: HashMap<String, String>,
}

impl MethodCall {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            arguments: HashMap::new(),
        }
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    pub fn argument(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).map(String::as_str)
    }
}

/// Structured failure reported back to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandFailure {
    pub code: String,
    pub message: String,
}

/// Outcome of one method call.
///
/// `NotImplemented` is deliberately not a failure: the UI branches on it to
/// detect capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CommandResult {
    Success(String),
    Failure(CommandFailure),
    NotImplemented,
}

impl CommandResult {
    /// Failure carrying the engine error code.
    pub fn engine_failure(message: impl Into<String>) -> Self {
        CommandResult::Failure(CommandFailure {
            code: ENGINE_ERROR_CODE.to_string(),
            message: message.into(),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CommandResult::Success(_))
    }

    pub fn is_not_implemented(&self) -> bool {
        matches!(self, CommandResult::NotImplemented)
    }

    pub fn payload(&self) -> Option<&str> {
        match self {
            CommandResult::Success(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&CommandFailure> {
        match self {
            CommandResult::Failure(failure) => Some(failure),
            _ => None,
        }
    }
}

/// One log line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogEvent(String);

impl LogEvent {
    pub fn new(line: impl Into<String>) -> Self {
        Self(line.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for LogEvent {
    fn from(line: String) -> Self {
        Self(line)
    }
}

impl From<&str> for LogEvent {
    fn from(line: &str) -> Self {
        Self(line.to_string())
    }
}

impl Display for LogEvent {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(&self.0)
    }
}

/// Identity of an event-channel subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for ListenerId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        write!(formatter, "{}", self.0)
    }
}
