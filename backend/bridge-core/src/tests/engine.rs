use crate::engine::{BridgeClient, EngineSlot, LocalEngine, LogSink};
use crate::engine::local::{get_env_name_regex, parse_environment};
use crate::error::engine::EngineError;
use crate::transport::LogEvent;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

fn recording_sink() -> (LogSink, Arc<Mutex<Vec<LogEvent>>>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&lines);
    let sink: LogSink = Arc::new(move |event: LogEvent| captured.lock().unwrap().push(event));
    (sink, lines)
}

fn status_of(payload: &str) -> String {
    let value: Value = serde_json::from_str(payload).expect("status payload is JSON");
    let object = value.as_object().expect("status payload is an object");
    assert_eq!(object.len(), 1, "status payload has exactly one key");
    object["status"].as_str().expect("status is a string").to_string()
}

// ----------------------------------------------------------------------------
// LocalEngine
// ----------------------------------------------------------------------------

/// **VALUE**: Verifies the start → status → stop cycle and the one-key status document.
///
/// **WHY THIS MATTERS**: The UI parses the status payload. An extra key or a renamed one
/// breaks the status indicator.
///
/// **BUG THIS CATCHES**: Would catch start not marking the engine running, or stop leaving
/// it marked running.
#[test]
fn given_local_engine_when_started_and_stopped_then_status_follows() {
    // GIVEN: A fresh engine
    let engine = LocalEngine::new();
    assert_eq!(status_of(&engine.get_status().unwrap()), "stopped");

    // WHEN: Starting with a config
    let started = engine.start_engine(r#"{"apps":{"http":{}}}"#).unwrap();

    // THEN: Running, and the config is active
    assert_eq!(status_of(&started), "running");
    assert!(engine.is_running());
    assert!(engine.active_config().is_some());

    // WHEN: Stopping
    let stopped = engine.stop_engine().unwrap();

    // THEN: Stopped and config released
    assert_eq!(status_of(&stopped), "stopped");
    assert!(!engine.is_running());
    assert!(engine.active_config().is_none());
}

/// **VALUE**: Verifies that non-object configs are rejected with a config error.
///
/// **BUG THIS CATCHES**: Would catch a start that accepts `[]`, `"x"` or garbage and then
/// reports the engine as running with no usable config.
#[test]
fn given_invalid_configs_when_started_then_returns_config_error() {
    // GIVEN: An engine and several bad configs
    let engine = LocalEngine::new();

    // WHEN / THEN: Each is rejected and the engine stays stopped
    for config in ["", "not json", "[]", r#""text""#, "42"] {
        let err = engine
            .start_engine(config)
            .expect_err("invalid config must fail");
        assert!(
            matches!(err, EngineError::Config { .. }),
            "'{config}' gave {err:?}"
        );
    }
    assert!(!engine.is_running());
}

/// **VALUE**: Verifies that reload requires a running engine.
///
/// **WHY THIS MATTERS**: A hot reload against a stopped engine would otherwise look
/// successful and the user would wonder why nothing is being served.
#[test]
fn given_stopped_engine_when_reloaded_then_returns_state_error() {
    // GIVEN: A stopped engine
    let engine = LocalEngine::new();

    // WHEN: Reloading
    let result = engine.reload_engine("{}");

    // THEN: A state error with a useful message
    let err = result.expect_err("reload must fail");
    assert!(matches!(err, EngineError::State { .. }));
    assert!(err.message().contains("not running"));
}

/// **VALUE**: Verifies that stopping twice is harmless.
///
/// **WHY THIS MATTERS**: Engine teardown always calls stop, even if the user already did.
#[test]
fn given_stopped_engine_when_stopped_again_then_succeeds_without_log_line() {
    // GIVEN: A stopped engine with a sink
    let engine = LocalEngine::new();
    let (sink, lines) = recording_sink();
    engine.set_log_sink(Some(sink));

    // WHEN: Stopping twice
    let first = engine.stop_engine();
    let second = engine.stop_engine();

    // THEN: Both succeed and no shutdown line is emitted
    assert!(first.is_ok());
    assert!(second.is_ok());
    assert!(lines.lock().unwrap().is_empty());
}

/// **VALUE**: Verifies log lines are JSON objects with level, ts, logger and msg.
///
/// **WHY THIS MATTERS**: The UI log view renders these fields; it does not parse free text.
#[test]
fn given_sink_installed_when_engine_starts_then_emits_structured_line() {
    // GIVEN: An engine with a recording sink
    let engine = LocalEngine::new();
    let (sink, lines) = recording_sink();
    engine.set_log_sink(Some(sink));

    // WHEN: Starting
    engine.start_engine("{}").unwrap();

    // THEN: One structured line
    let lines = lines.lock().unwrap();
    assert_eq!(lines.len(), 1);
    let line: Value = serde_json::from_str(lines[0].as_str()).unwrap();
    assert_eq!(line["level"], "info");
    assert_eq!(line["logger"], "engine");
    assert_eq!(line["msg"], "serving initial configuration");
    assert!(line["ts"].as_f64().unwrap() > 0.0);
}

/// **VALUE**: Verifies that environment values are stored but never appear in log lines.
///
/// **WHY THIS MATTERS**: The environment carries DNS provider tokens and similar secrets.
///
/// **BUG THIS CATCHES**: Would catch a log line that formats the incoming map.
#[test]
fn given_environment_with_secret_when_set_then_stored_and_not_logged() {
    // GIVEN: An engine with a recording sink
    let engine = LocalEngine::new();
    let (sink, lines) = recording_sink();
    engine.set_log_sink(Some(sink));

    // WHEN: Setting an environment with a secret value
    let result = engine.set_environment(r#"{"CF_API_TOKEN":"tok-123","ACME_EMAIL":"a@b.c"}"#);

    // THEN: Stored, sorted, and not logged
    assert_eq!(status_of(&result.unwrap()), "stopped");
    assert_eq!(engine.environment_keys(), vec!["ACME_EMAIL", "CF_API_TOKEN"]);
    assert_eq!(
        engine.environment_value("CF_API_TOKEN").unwrap().expose(),
        "tok-123"
    );
    for line in lines.lock().unwrap().iter() {
        assert!(!line.as_str().contains("tok-123"));
    }
}

/// **VALUE**: Verifies environment variable names are validated.
///
/// **BUG THIS CATCHES**: Would catch names with `=`, spaces, or leading digits reaching the
/// engine, where they break config placeholder substitution.
#[test]
fn given_invalid_variable_names_when_parsed_then_returns_environment_error() {
    // GIVEN: Maps with bad keys, and non-map payloads
    let bad = [
        r#"{"1ABC":"x"}"#,
        r#"{"A B":"x"}"#,
        r#"{"A=B":"x"}"#,
        r#"{"":"x"}"#,
        r#"{"A":1}"#,
        "[]",
        "nope",
    ];

    // WHEN / THEN: All rejected
    for env in bad {
        let err = parse_environment(env).expect_err("must reject");
        assert!(matches!(err, EngineError::Environment { .. }), "{env}");
    }

    // AND: The regex accepts ordinary names
    let re = get_env_name_regex();
    assert!(re.is_match("_PRIVATE"));
    assert!(re.is_match("CF_API_TOKEN2"));
}

// ----------------------------------------------------------------------------
// EngineSlot
// ----------------------------------------------------------------------------

fn counting_slot() -> (EngineSlot, Arc<AtomicUsize>) {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&created);
    let slot = EngineSlot::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Arc::new(LocalEngine::new()) as Arc<dyn BridgeClient>
    });
    (slot, created)
}

/// **VALUE**: Verifies that `initialize()` is idempotent.
///
/// **WHY THIS MATTERS**: Every command initializes the slot. Creating a second engine would
/// orphan the first one along with whatever it is serving.
///
/// **BUG THIS CATCHES**: Would catch the factory being called per command.
#[test]
fn given_slot_when_initialized_repeatedly_then_factory_runs_once() {
    // GIVEN: An empty slot
    let (slot, created) = counting_slot();
    assert!(!slot.is_initialized());

    // WHEN: Initializing from several threads
    let slot = Arc::new(slot);
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let slot = Arc::clone(&slot);
            std::thread::spawn(move || slot.initialize())
        })
        .collect();
    let engines: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // THEN: One engine, shared by everyone
    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(engines.iter().all(|e| e.ptr_eq(&engines[0])));
}

/// **VALUE**: Verifies that a log sink set before the engine exists is applied on creation.
///
/// **WHY THIS MATTERS**: The host attaches (and routes logs) before the first command
/// creates the engine. Without this the first start's log lines would vanish.
#[test]
fn given_sink_set_before_initialize_when_engine_logs_then_sink_receives_line() {
    // GIVEN: A slot with a sink but no engine
    let (slot, _) = counting_slot();
    let (sink, lines) = recording_sink();
    slot.set_log_sink(Some(sink));

    // WHEN: Creating the engine and starting it
    slot.initialize().client().start_engine("{}").unwrap();

    // THEN: The start line was routed
    assert_eq!(lines.lock().unwrap().len(), 1);
}

/// **VALUE**: Verifies that teardown stops the engine and that the next initialize builds
/// a fresh one.
#[test]
fn given_running_engine_when_torn_down_then_next_initialize_creates_new_engine() {
    // GIVEN: A running engine
    let (slot, created) = counting_slot();
    let first = slot.initialize();
    first.client().start_engine("{}").unwrap();

    // WHEN: Tearing down
    slot.teardown().unwrap();

    // THEN: The old engine is stopped and the slot is empty
    assert!(first.client().get_status().unwrap().contains("stopped"));
    assert!(slot.get().is_none());

    // AND: Tearing down again is a no-op
    assert!(slot.teardown().is_ok());

    // AND: Initialize builds a second engine
    let second = slot.initialize();
    assert!(!second.ptr_eq(&first));
    assert_eq!(created.load(Ordering::SeqCst), 2);
}

/// **VALUE**: Verifies that `clear_log_sink_if` only clears the sink it was handed.
///
/// **WHY THIS MATTERS**: Two surfaces can share one engine. The one that attached last owns
/// the log routing; an older surface going away must not take it down.
///
/// **BUG THIS CATCHES**: Would catch an unconditional clear, or a comparison by value that
/// treats any installed sink as a match.
#[test]
fn given_newer_sink_installed_when_older_sink_cleared_then_newer_sink_keeps_receiving() {
    // GIVEN: A running engine whose sink was replaced by a newer one
    let (slot, _) = counting_slot();
    let (older, older_lines) = recording_sink();
    let (newer, newer_lines) = recording_sink();
    slot.set_log_sink(Some(Arc::clone(&older)));
    let handle = slot.initialize();
    slot.set_log_sink(Some(Arc::clone(&newer)));

    // WHEN: Clearing the older sink
    let cleared = slot.clear_log_sink_if(&older);
    handle.client().start_engine("{}").unwrap();

    // THEN: Nothing was cleared and the newer sink got the start line
    assert!(!cleared);
    assert!(older_lines.lock().unwrap().is_empty());
    assert_eq!(newer_lines.lock().unwrap().len(), 1);

    // AND: Clearing the installed sink does unroute the engine
    assert!(slot.clear_log_sink_if(&newer));
    handle.client().stop_engine().unwrap();
    assert_eq!(newer_lines.lock().unwrap().len(), 1);
}

/// **VALUE**: Verifies that `{env.NAME}` placeholders in the config are filled from the
/// environment set through `setEnvironment`, on start and again on reload.
///
/// **WHY THIS MATTERS**: The environment exists to feed secrets such as DNS tokens into the
/// config without writing them into the config text.
///
/// **BUG THIS CATCHES**: Would catch the environment being stored but never applied, keys
/// being rewritten, or reload serving a stale value.
#[test]
fn given_environment_set_when_started_and_reloaded_then_placeholders_expanded() {
    // GIVEN: An engine with one variable set
    let engine = LocalEngine::new();
    engine
        .set_environment(r#"{"BRIDGE_TEST_TOKEN":"first"}"#)
        .unwrap();
    let config = r#"{
        "apps": {"tls": {"token": "{env.BRIDGE_TEST_TOKEN}"}},
        "{env.BRIDGE_TEST_TOKEN}": ["prefix-{env.BRIDGE_TEST_TOKEN}", "{env.BRIDGE_TEST_UNSET_7F3A}"]
    }"#;

    // WHEN: Starting
    engine.start_engine(config).unwrap();

    // THEN: String values are expanded, unknown names become empty and keys are untouched
    let active = engine.active_config().unwrap();
    assert_eq!(active["apps"]["tls"]["token"], "first");
    assert_eq!(active["{env.BRIDGE_TEST_TOKEN}"][0], "prefix-first");
    assert_eq!(active["{env.BRIDGE_TEST_TOKEN}"][1], "");

    // WHEN: Changing the variable and reloading
    engine
        .set_environment(r#"{"BRIDGE_TEST_TOKEN":"second"}"#)
        .unwrap();
    engine.reload_engine(config).unwrap();

    // THEN: The reload sees the new value
    let active = engine.active_config().unwrap();
    assert_eq!(active["apps"]["tls"]["token"], "second");
}
