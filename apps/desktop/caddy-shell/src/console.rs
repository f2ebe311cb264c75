//! Console line handling.
//!
//! One line of input is one [`ConsoleInput`]. Recognized words map to engine
//! commands; any other word is forwarded as a method name so the bridge can
//! answer "not implemented".

use crate::error::ShellError;
use crate::surface::Surface;

use bridge_core::channel::Command;
use bridge_core::transport::{CommandResult, MethodCall};
use bridge_core::ui::UiContext;

use common::ErrorLocation;

use std::panic::Location;
use std::path::Path;

use log::{debug, info};
use serde_json::{Map, Value};

pub const HELP_TEXT: &str = "\
commands:
  start [file]        start the engine (config from file, default {})
  reload [file]       reload the running engine
  stop                stop the engine
  status              show engine status
  env KEY=VALUE...    set engine environment variables
  logs on|off         show or hide engine log lines
  help                show this text
  quit                detach and exit
anything else is sent as-is; KEY=VALUE words become arguments";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Call(MethodCall),
    Logs(bool),
    Help,
    Quit,
    Empty,
}

/// Parse one console line.
///
/// # Errors
///
/// Returns [`ShellError::Input`] for malformed arguments or an unreadable config file.
pub fn parse_line(line: &str) -> Result<ConsoleInput, ShellError> {
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Ok(ConsoleInput::Empty);
    };
    let rest: Vec<&str> = words.collect();

    let input = match word {
        "help" | "?" => ConsoleInput::Help,
        "quit" | "exit" => ConsoleInput::Quit,
        "start" => ConsoleInput::Call(match single_path(word, &rest)? {
            Some(path) => Command::Start {
                config: read_config(path)?,
            }
            .to_call(),
            None => MethodCall::new(word),
        }),
        "reload" => ConsoleInput::Call(match single_path(word, &rest)? {
            Some(path) => Command::Reload {
                config: read_config(path)?,
            }
            .to_call(),
            None => MethodCall::new(word),
        }),
        "stop" | "status" => ConsoleInput::Call(MethodCall::new(word)),
        "env" => ConsoleInput::Call(
            Command::SetEnvironment {
                env: environment_json(&rest)?,
            }
            .to_call(),
        ),
        "logs" => match rest.as_slice() {
            ["on"] => ConsoleInput::Logs(true),
            ["off"] => ConsoleInput::Logs(false),
            _ => return Err(input_error("usage: logs on|off")),
        },
        other => {
            let mut call = MethodCall::new(other);
            for argument in rest {
                let (key, value) = split_pair(argument)?;
                call = call.with_argument(key, value);
            }
            ConsoleInput::Call(call)
        }
    };

    Ok(input)
}

/// One line describing a command's outcome.
pub fn render_result(method: &str, result: &CommandResult) -> String {
    match result {
        CommandResult::Success(payload) => format!("{method}: {payload}"),
        CommandResult::Failure(failure) => {
            format!("{method} failed [{}]: {}", failure.code, failure.message)
        }
        CommandResult::NotImplemented => format!("{method}: not implemented"),
    }
}

/// Line handler living on the UI thread.
pub struct Console {
    surface: Surface,
    ui: UiContext,
}

impl Console {
    pub fn new(surface: Surface, ui: UiContext) -> Self {
        Self { surface, ui }
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Act on one line of input. Problems are printed, never returned.
    pub fn handle_line(&self, line: &str) {
        let input = match parse_line(line) {
            Ok(input) => input,
            Err(e) => {
                debug!("Rejected console input: {e}");
                self.surface.print(error_text(&e));
                return;
            }
        };

        match input {
            ConsoleInput::Call(call) => {
                if let Err(e) = self.surface.dispatch(call) {
                    self.surface.print(error_text(&e));
                }
            }
            ConsoleInput::Logs(true) => {
                if let Err(e) = self.surface.subscribe_logs() {
                    self.surface.print(error_text(&e));
                }
            }
            ConsoleInput::Logs(false) => {
                self.surface.unsubscribe_logs();
            }
            ConsoleInput::Help => self.surface.print(HELP_TEXT),
            ConsoleInput::Quit => {
                info!("Quit requested from console");
                self.ui.quit();
            }
            ConsoleInput::Empty => {}
        }
    }
}

fn error_text(error: &ShellError) -> String {
    match error {
        ShellError::Shell { message, .. }
        | ShellError::Bridge { message, .. }
        | ShellError::Input { message, .. } => format!("error: {message}"),
    }
}

#[track_caller]
fn input_error(message: impl Into<String>) -> ShellError {
    ShellError::Input {
        message: message.into(),
        location: ErrorLocation::from(Location::caller()),
    }
}

fn single_path<'a>(command: &str, rest: &[&'a str]) -> Result<Option<&'a str>, ShellError> {
    match rest {
        [] => Ok(None),
        [path] => Ok(Some(*path)),
        _ => Err(input_error(format!("usage: {command} [file]"))),
    }
}

fn read_config(path: &str) -> Result<String, ShellError> {
    std::fs::read_to_string(Path::new(path))
        .map_err(|e| input_error(format!("cannot read {path}: {e}")))
}

fn split_pair(argument: &str) -> Result<(&str, &str), ShellError> {
    match argument.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => Err(input_error(format!("expected KEY=VALUE, got {argument:?}"))),
    }
}

fn environment_json(pairs: &[&str]) -> Result<String, ShellError> {
    if pairs.is_empty() {
        return Err(input_error("usage: env KEY=VALUE..."));
    }

    let mut variables = Map::new();
    for pair in pairs {
        let (key, value) = split_pair(pair)?;
        variables.insert(key.to_string(), Value::String(value.to_string()));
    }

    Ok(Value::Object(variables).to_string())
}
