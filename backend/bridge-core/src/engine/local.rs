//! In-process engine.
//!
//! Mirrors the observable behavior of the native bridge library: configs must be
//! JSON objects, status is a one-key JSON document, and the environment is a
//! JSON map of variable names to values. Log lines are emitted as JSON objects.
//!
//! `{env.NAME}` placeholders in config string values are expanded on start and
//! reload: variables set through `set_environment` first, then the process
//! environment, else the empty string.

use crate::engine::{BridgeClient, LogSink};
use crate::error::engine::EngineError;
use crate::transport::LogEvent;

use common::{ErrorLocation, RedactedValue};

use std::collections::BTreeMap;
use std::env;
use std::panic::Location;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{Level, debug, info};
use parking_lot::RwLock;
use regex::{Captures, Regex};
use serde_json::{Value, json};

const STATUS_RUNNING: &str = "running";
const STATUS_STOPPED: &str = "stopped";
const LOGGER_NAME: &str = "engine";
const ENV_NAME_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";
const ENV_PLACEHOLDER_PATTERN: &str = r"\{env\.([A-Za-z_][A-Za-z0-9_]*)\}";

static ENV_NAME_REGEX: OnceLock<Regex> = OnceLock::new();
static ENV_PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();

pub(crate) fn get_env_name_regex() -> &'static Regex {
    ENV_NAME_REGEX.get_or_init(|| Regex::new(ENV_NAME_PATTERN).expect("valid regex pattern"))
}

fn get_env_placeholder_regex() -> &'static Regex {
    ENV_PLACEHOLDER_REGEX
        .get_or_init(|| Regex::new(ENV_PLACEHOLDER_PATTERN).expect("valid regex pattern"))
}

#[derive(Default)]
struct EngineState {
    running: bool,
    config: Option<Value>,
    environment: BTreeMap<String, RedactedValue>,
}

/// Engine that keeps its state in memory.
#[derive(Default)]
pub struct LocalEngine {
    state: RwLock<EngineState>,
    log_sink: RwLock<Option<LogSink>>,
}

impl LocalEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.state.read().running
    }

    /// Config the engine is currently serving, placeholders expanded.
    pub fn active_config(&self) -> Option<Value> {
        self.state.read().config.clone()
    }

    /// Names of the variables set through `set_environment`, sorted.
    pub fn environment_keys(&self) -> Vec<String> {
        self.state.read().environment.keys().cloned().collect()
    }

    pub fn environment_value(&self, key: &str) -> Option<RedactedValue> {
        self.state.read().environment.get(key).cloned()
    }

    /// Emit one log line to the installed sink, if any.
    pub fn log(&self, level: Level, message: &str) {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64())
            .unwrap_or_default();

        let line = json!({
            "level": level.as_str().to_lowercase(),
            "ts": timestamp,
            "logger": LOGGER_NAME,
            "msg": message,
        })
        .to_string();

        let sink = self.log_sink.read().clone();
        match sink {
            Some(sink) => sink(LogEvent::from(line)),
            None => debug!("Engine log with no sink: {message}"),
        }
    }

    fn status_payload(running: bool) -> String {
        let status = if running {
            STATUS_RUNNING
        } else {
            STATUS_STOPPED
        };
        json!({ "status": status }).to_string()
    }
}

impl BridgeClient for LocalEngine {
    fn start_engine(&self, config: &str) -> Result<String, EngineError> {
        let mut config = parse_config(config)?;

        let was_running = {
            let mut state = self.state.write();
            expand_environment(&mut config, &state.environment);
            let was_running = state.running;
            state.running = true;
            state.config = Some(config);
            was_running
        };

        if was_running {
            info!("Engine already running, new config loaded");
            self.log(Level::Info, "load complete; replaced running config");
        } else {
            info!("Engine started");
            self.log(Level::Info, "serving initial configuration");
        }

        Ok(Self::status_payload(true))
    }

    fn stop_engine(&self) -> Result<String, EngineError> {
        let was_running = {
            let mut state = self.state.write();
            let was_running = state.running;
            state.running = false;
            state.config = None;
            was_running
        };

        if was_running {
            info!("Engine stopped");
            self.log(Level::Info, "shutdown complete");
        } else {
            debug!("Stop requested while engine already stopped");
        }

        Ok(Self::status_payload(false))
    }

    fn reload_engine(&self, config: &str) -> Result<String, EngineError> {
        let mut config = parse_config(config)?;

        {
            let mut state = self.state.write();
            if !state.running {
                return Err(EngineError::State {
                    message: String::from("engine is not running; start it before reloading"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            expand_environment(&mut config, &state.environment);
            state.config = Some(config);
        }

        info!("Engine config reloaded");
        self.log(Level::Info, "config reloaded");

        Ok(Self::status_payload(true))
    }

    fn get_status(&self) -> Result<String, EngineError> {
        Ok(Self::status_payload(self.state.read().running))
    }

    fn set_environment(&self, env: &str) -> Result<String, EngineError> {
        let variables = parse_environment(env)?;
        let count = variables.len();

        let running = {
            let mut state = self.state.write();
            state.environment.extend(variables);
            state.running
        };

        info!("Engine environment updated ({count} variables)");
        self.log(
            Level::Info,
            &format!("environment updated ({count} variables)"),
        );

        Ok(Self::status_payload(running))
    }

    fn set_log_sink(&self, sink: Option<LogSink>) {
        *self.log_sink.write() = sink;
    }
}

#[track_caller]
pub(crate) fn parse_config(config: &str) -> Result<Value, EngineError> {
    let location = ErrorLocation::from(Location::caller());

    let value: Value = serde_json::from_str(config).map_err(|e| EngineError::Config {
        message: format!("invalid config JSON: {e}"),
        location,
    })?;

    if !value.is_object() {
        return Err(EngineError::Config {
            message: String::from("config must be a JSON object"),
            location,
        });
    }

    Ok(value)
}

#[track_caller]
pub(crate) fn parse_environment(env: &str) -> Result<BTreeMap<String, RedactedValue>, EngineError> {
    let location = ErrorLocation::from(Location::caller());

    let raw: BTreeMap<String, String> =
        serde_json::from_str(env).map_err(|e| EngineError::Environment {
            message: format!("invalid environment JSON: {e}"),
            location,
        })?;

    let re = get_env_name_regex();
    let mut variables = BTreeMap::new();

    for (key, value) in raw {
        if !re.is_match(&key) {
            return Err(EngineError::Environment {
                message: format!("invalid environment variable name: {key:?}"),
                location,
            });
        }
        variables.insert(key, RedactedValue::new(value));
    }

    Ok(variables)
}

/// Replace `{env.NAME}` in every string value of `config`, recursively. Keys are left alone.
pub(crate) fn expand_environment(config: &mut Value, environment: &BTreeMap<String, RedactedValue>) {
    match config {
        Value::String(text) => {
            let re = get_env_placeholder_regex();
            if re.is_match(text) {
                let expanded = re
                    .replace_all(text, |captures: &Captures| lookup_variable(environment, &captures[1]))
                    .into_owned();
                *text = expanded;
            }
        }
        Value::Array(items) => {
            for item in items {
                expand_environment(item, environment);
            }
        }
        Value::Object(fields) => {
            for value in fields.values_mut() {
                expand_environment(value, environment);
            }
        }
        _ => {}
    }
}

fn lookup_variable(environment: &BTreeMap<String, RedactedValue>, name: &str) -> String {
    match environment.get(name) {
        Some(value) => value.expose().to_string(),
        None => env::var(name).unwrap_or_default(),
    }
}
