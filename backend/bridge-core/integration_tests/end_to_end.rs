use crate::helpers::Harness;

use bridge_core::LOG_CHANNEL;
use bridge_core::engine::{BridgeClient, EngineSlot, LocalEngine};
use bridge_core::transport::{CommandResult, MethodCall};

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::Level;
use serde_json::Value;

const VALID_CONFIG: &str = r#"{"apps":{"http":{"servers":{"srv0":{"listen":[":8080"]}}}}}"#;

fn messages(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .map(|line| {
            let value: Value = serde_json::from_str(line).expect("engine lines are JSON");
            value["msg"].as_str().unwrap_or_default().to_string()
        })
        .collect()
}

/// **VALUE**: Full round trip with the in-process engine: subscribe, start, three log lines
/// in order, stop, then logs with nobody listening are dropped.
///
/// **WHY THIS MATTERS**: This is what a user does in the app. Every piece (transport, worker
/// dispatch, engine, log routing, UI-thread delivery) has to line up.
///
/// **BUG THIS CATCHES**: Would catch lost or reordered log lines between the engine's thread
/// and the UI, a start that reports success without a running engine, or log delivery after
/// the subscription is cancelled.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_subscribed_ui_when_engine_started_logs_and_stopped_then_events_flow_in_order() {
    // GIVEN: A bridge over a local engine with a log subscriber
    let engine = Arc::new(LocalEngine::new());
    let factory_engine = Arc::clone(&engine);
    let slot = Arc::new(EngineSlot::new(move || {
        Arc::clone(&factory_engine) as Arc<dyn BridgeClient>
    }));
    let mut harness = Harness::new(slot);
    let lines = harness.listen_logs();

    // WHEN: Starting with a valid config
    let started = harness
        .invoke(MethodCall::new("start").with_argument("config", VALID_CONFIG))
        .await;

    // THEN: Success with a running status
    assert_eq!(
        started,
        CommandResult::Success(String::from(r#"{"status":"running"}"#))
    );
    assert!(engine.is_running());

    // WHEN: The engine logs three lines from its own thread
    let emitter = Arc::clone(&engine);
    thread::spawn(move || {
        emitter.log(Level::Info, "first");
        emitter.log(Level::Warn, "second");
        emitter.log(Level::Error, "third");
    })
    .join()
    .unwrap();

    // THEN: The subscriber sees them after the start line, in emission order
    harness
        .drive_until(|| lines.lock().unwrap().len() >= 4)
        .await;
    assert_eq!(
        messages(&lines.lock().unwrap()),
        vec!["serving initial configuration", "first", "second", "third"]
    );

    // WHEN: Stopping
    let stopped = harness.invoke(MethodCall::new("stop")).await;

    // THEN: Success with a stopped status
    assert_eq!(
        stopped,
        CommandResult::Success(String::from(r#"{"status":"stopped"}"#))
    );
    harness
        .drive_until(|| lines.lock().unwrap().len() >= 5)
        .await;

    // WHEN: The subscriber leaves and the stopped engine keeps logging
    assert!(harness.transport.cancel(LOG_CHANNEL));
    engine.log(Level::Info, "nobody is listening");
    harness.settle(Duration::from_millis(50)).await;

    // THEN: Dropped
    assert_eq!(lines.lock().unwrap().len(), 5);
    assert!(!harness.host.event_stream().unwrap().is_attached());
}

/// **VALUE**: Verifies setEnvironment through the bridge reaches the engine and an invalid
/// environment comes back as CADDY_ERROR.
#[tokio::test]
async fn given_local_engine_when_environment_set_then_stored_and_invalid_names_rejected() {
    // GIVEN: A bridge over a local engine
    let engine = Arc::new(LocalEngine::new());
    let factory_engine = Arc::clone(&engine);
    let slot = Arc::new(EngineSlot::new(move || {
        Arc::clone(&factory_engine) as Arc<dyn BridgeClient>
    }));
    let mut harness = Harness::new(slot);

    // WHEN: Setting a valid environment
    let ok = harness
        .invoke(MethodCall::new("setEnvironment").with_argument("env", r#"{"CF_API_TOKEN":"t"}"#))
        .await;

    // THEN: Stored
    assert!(ok.is_success());
    assert_eq!(engine.environment_keys(), vec!["CF_API_TOKEN"]);

    // WHEN: Setting one with an invalid name
    let bad = harness
        .invoke(MethodCall::new("setEnvironment").with_argument("env", r#"{"BAD NAME":"t"}"#))
        .await;

    // THEN: Engine error
    let failure = bad.failure().expect("invalid name must fail");
    assert_eq!(failure.code, "CADDY_ERROR");
    assert!(failure.message.contains("BAD NAME"));

    // AND: Reload on a stopped engine is an engine error too
    let reload = harness.invoke(MethodCall::new("reload")).await;
    assert!(reload.failure().is_some());
}
