use crate::EMPTY_JSON_OBJECT;
use crate::engine::BridgeClient;
use crate::error::engine::EngineError;
use crate::transport::MethodCall;

/// Method and argument names understood by the command channel.
pub mod names {
    pub const START: &str = "start";
    pub const STOP: &str = "stop";
    pub const RELOAD: &str = "reload";
    pub const STATUS: &str = "status";
    pub const SET_ENVIRONMENT: &str = "setEnvironment";

    pub const CONFIG_ARGUMENT: &str = "config";
    pub const ENV_ARGUMENT: &str = "env";
}

/// A recognized engine command with its arguments resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start { config: String },
    Stop,
    Reload { config: String },
    Status,
    SetEnvironment { env: String },
}

impl Command {
    /// Resolve a method call. `None` means the method name is not recognized.
    ///
    /// Missing `config`/`env` arguments default to `"{}"`; a supplied value,
    /// even an empty one, is passed through untouched.
    pub fn from_call(call: &MethodCall) -> Option<Self> {
        let command = match call.method.as_str() {
            names::START => Command::Start {
                config: argument_or_default(call, names::CONFIG_ARGUMENT),
            },
            names::STOP => Command::Stop,
            names::RELOAD => Command::Reload {
                config: argument_or_default(call, names::CONFIG_ARGUMENT),
            },
            names::STATUS => Command::Status,
            names::SET_ENVIRONMENT => Command::SetEnvironment {
                env: argument_or_default(call, names::ENV_ARGUMENT),
            },
            _ => return None,
        };

        Some(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Start { .. } => names::START,
            Command::Stop => names::STOP,
            Command::Reload { .. } => names::RELOAD,
            Command::Status => names::STATUS,
            Command::SetEnvironment { .. } => names::SET_ENVIRONMENT,
        }
    }

    /// The wire form of this command.
    pub fn to_call(&self) -> MethodCall {
        let call = MethodCall::new(self.name());
        match self {
            Command::Start { config } | Command::Reload { config } => {
                call.with_argument(names::CONFIG_ARGUMENT, config.as_str())
            }
            Command::SetEnvironment { env } => call.with_argument(names::ENV_ARGUMENT, env.as_str()),
            Command::Stop | Command::Status => call,
        }
    }

    /// One blocking call into the engine.
    pub(crate) fn execute(&self, client: &dyn BridgeClient) -> Result<String, EngineError> {
        match self {
            Command::Start { config } => client.start_engine(config),
            Command::Stop => client.stop_engine(),
            Command::Reload { config } => client.reload_engine(config),
            Command::Status => client.get_status(),
            Command::SetEnvironment { env } => client.set_environment(env),
        }
    }
}

fn argument_or_default(call: &MethodCall, key: &str) -> String {
    call.argument(key).unwrap_or(EMPTY_JSON_OBJECT).to_string()
}
