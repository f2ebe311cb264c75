use crate::channel::{Command, names, run_command};
use crate::engine::{BridgeClient, EngineSlot};
use crate::tests::fakes::FaultyEngine;
use crate::transport::{CommandResult, MethodCall};
use crate::{EMPTY_JSON_OBJECT, ENGINE_ERROR_CODE};

use std::sync::Arc;
use std::sync::atomic::Ordering;

fn slot_with(engine: Arc<FaultyEngine>) -> EngineSlot {
    EngineSlot::new(move || Arc::clone(&engine) as Arc<dyn BridgeClient>)
}

// ----------------------------------------------------------------------------
// Command::from_call()
// ----------------------------------------------------------------------------

/// **VALUE**: Verifies that start, reload and setEnvironment default their argument to "{}".
///
/// **WHY THIS MATTERS**: The UI is allowed to omit the argument. The engine must still
/// receive valid JSON rather than an empty string.
///
/// **BUG THIS CATCHES**: Would catch a default that drifts (e.g. "" or "null") or that is
/// only applied to some of the three commands.
#[test]
fn given_calls_without_arguments_when_resolved_then_defaults_to_empty_object() {
    // GIVEN: Bare calls
    let start = MethodCall::new(names::START);
    let reload = MethodCall::new(names::RELOAD);
    let env = MethodCall::new(names::SET_ENVIRONMENT);

    // WHEN: Resolving them
    // THEN: Every argument defaults to "{}"
    assert_eq!(
        Command::from_call(&start),
        Some(Command::Start {
            config: EMPTY_JSON_OBJECT.to_string()
        })
    );
    assert_eq!(
        Command::from_call(&reload),
        Some(Command::Reload {
            config: EMPTY_JSON_OBJECT.to_string()
        })
    );
    assert_eq!(
        Command::from_call(&env),
        Some(Command::SetEnvironment {
            env: EMPTY_JSON_OBJECT.to_string()
        })
    );
}

/// **VALUE**: Verifies that an explicitly supplied empty string is not replaced by the default.
///
/// **WHY THIS MATTERS**: The default only applies to an absent argument. Rewriting "" would
/// hide a UI bug behind a silently successful start.
///
/// **BUG THIS CATCHES**: Would catch `unwrap_or` being replaced with an emptiness check.
#[test]
fn given_empty_config_argument_when_resolved_then_forwarded_unchanged() {
    // GIVEN: A start call carrying an empty config
    let call = MethodCall::new(names::START).with_argument(names::CONFIG_ARGUMENT, "");

    // WHEN: Resolving it
    let command = Command::from_call(&call);

    // THEN: The empty string survives
    assert_eq!(
        command,
        Some(Command::Start {
            config: String::new()
        })
    );
}

/// **VALUE**: Verifies that unknown method names do not resolve to a command.
///
/// **BUG THIS CATCHES**: Would catch a case-insensitive or prefix match sneaking in,
/// e.g. "Status" or "statusX" resolving to `status`.
#[test]
fn given_unknown_methods_when_resolved_then_returns_none() {
    // GIVEN: Names that are close to, but not, real commands
    let unknown = ["bogus", "Status", "statusX", "set_environment", ""];

    // WHEN / THEN: None of them resolve
    for method in unknown {
        assert!(
            Command::from_call(&MethodCall::new(method)).is_none(),
            "'{method}' must not resolve"
        );
    }
}

/// **VALUE**: Verifies that a command's wire form resolves back to the same command.
///
/// **WHY THIS MATTERS**: The shell builds calls with `to_call()` and the channel parses
/// them with `from_call()`. Argument names must agree on both sides.
#[test]
fn given_set_environment_command_when_sent_as_call_then_resolves_to_same_command() {
    // GIVEN: A command with a payload
    let command = Command::SetEnvironment {
        env: r#"{"CF_TOKEN":"x"}"#.to_string(),
    };

    // WHEN: Converting to the wire form and back
    let call = command.to_call();

    // THEN: Method and argument line up
    assert_eq!(call.method, "setEnvironment");
    assert_eq!(call.argument("env"), Some(r#"{"CF_TOKEN":"x"}"#));
    assert_eq!(Command::from_call(&call), Some(command));
}

// ----------------------------------------------------------------------------
// run_command()
// ----------------------------------------------------------------------------

/// **VALUE**: Verifies that an engine `Err` becomes a CADDY_ERROR failure carrying its message.
///
/// **WHY THIS MATTERS**: This is the one conversion every command funnels through. The UI
/// shows the message to the user.
///
/// **BUG THIS CATCHES**: Would catch a missing code, a wrong code, or the Display form
/// (with source location) leaking into the user-facing message.
#[test]
fn given_failing_stop_when_run_then_returns_engine_failure_with_message() {
    // GIVEN: An engine whose stop fails
    let slot = slot_with(Arc::new(FaultyEngine::failing_stop("listener busy")));

    // WHEN: Running stop
    let result = run_command(&slot, &Command::Stop);

    // THEN: A CADDY_ERROR failure with the engine's message
    let failure = result.failure().expect("stop must fail");
    assert_eq!(failure.code, ENGINE_ERROR_CODE);
    assert_eq!(failure.message, "listener busy");
}

/// **VALUE**: Verifies that a failure message is never empty.
///
/// **WHY THIS MATTERS**: An empty error message renders as a blank toast and gives the user
/// nothing to act on.
///
/// **BUG THIS CATCHES**: Would catch the fallback message being removed.
#[test]
fn given_failure_with_blank_message_when_run_then_message_is_not_empty() {
    // GIVEN: An engine that fails stop with a blank message
    let slot = slot_with(Arc::new(FaultyEngine::failing_stop("  ")));

    // WHEN: Running stop
    let result = run_command(&slot, &Command::Stop);

    // THEN: The message names the command
    let failure = result.failure().expect("stop must fail");
    assert_eq!(failure.code, ENGINE_ERROR_CODE);
    assert!(failure.message.contains("stop"));
}

/// **VALUE**: Verifies that an engine panic is converted into a CADDY_ERROR failure.
///
/// **WHY THIS MATTERS**: A panic inside a worker would otherwise drop the reply on the
/// floor and the UI would see a generic "finished without a result".
///
/// **BUG THIS CATCHES**: Would catch `catch_unwind` being removed from the dispatch path.
#[test]
fn given_panicking_reload_when_run_then_returns_engine_failure_with_panic_message() {
    // GIVEN: An engine whose reload panics
    let slot = slot_with(Arc::new(FaultyEngine::failing_stop("unused")));

    // WHEN: Running reload
    let result = run_command(
        &slot,
        &Command::Reload {
            config: EMPTY_JSON_OBJECT.to_string(),
        },
    );

    // THEN: The panic surfaces as a failure
    let failure = result.failure().expect("reload must fail");
    assert_eq!(failure.code, ENGINE_ERROR_CODE);
    assert!(failure.message.contains("reload exploded"));
}

/// **VALUE**: Verifies that an engine without environment support reports NotImplemented.
///
/// **WHY THIS MATTERS**: NotImplemented is how the UI discovers optional capabilities.
/// Reporting it as CADDY_ERROR would show an error dialog for a missing feature.
///
/// **BUG THIS CATCHES**: Would catch `EngineError::Unsupported` falling into the generic
/// failure arm.
#[test]
fn given_engine_without_environment_support_when_set_environment_run_then_not_implemented() {
    // GIVEN: An engine that keeps the default set_environment
    let slot = slot_with(Arc::new(FaultyEngine::failing_stop("unused")));

    // WHEN: Running setEnvironment
    let result = run_command(
        &slot,
        &Command::SetEnvironment {
            env: EMPTY_JSON_OBJECT.to_string(),
        },
    );

    // THEN: Not implemented, not a failure
    assert_eq!(result, CommandResult::NotImplemented);
}

/// **VALUE**: Verifies that each command makes exactly one engine call and the success
/// payload is the engine's string, untouched.
#[test]
fn given_healthy_start_when_run_then_payload_is_engine_string() {
    // GIVEN: A fake engine
    let engine = Arc::new(FaultyEngine::failing_stop("unused"));
    let slot = slot_with(Arc::clone(&engine));

    // WHEN: Running start with a config
    let result = run_command(
        &slot,
        &Command::Start {
            config: r#"{"apps":{}}"#.to_string(),
        },
    );

    // THEN: Payload is passed through and the engine was called once
    assert_eq!(result.payload(), Some(r#"started with {"apps":{}}"#));
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
}
