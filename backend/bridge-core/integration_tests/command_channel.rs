use crate::helpers::{Gate, Harness, ScriptedEngine, slot_for};

use bridge_core::transport::{CommandResult, MethodCall};
use bridge_core::{COMMAND_CHANNEL, ENGINE_ERROR_CODE};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

// ============================================================================
// Command channel behavior through the transport, as the UI sees it
// ============================================================================

/// **VALUE**: Verifies that every recognized command resolves exactly once.
///
/// **WHY THIS MATTERS**: The UI awaits each call. A missing reply hangs a button forever;
/// a duplicate reply resolves someone else's pending call.
///
/// **BUG THIS CATCHES**: Would catch a dispatcher arm that forgets to complete its
/// `MethodResult`, or completes it from two paths.
#[tokio::test]
async fn given_each_recognized_command_when_sent_then_reply_arrives_exactly_once() {
    // GIVEN: A bridge over a scripted engine
    let engine = Arc::new(ScriptedEngine::default());
    let mut harness = Harness::new(slot_for(Arc::clone(&engine)));
    let replies = Arc::new(AtomicUsize::new(0));

    // WHEN: Sending every command
    let methods = ["start", "stop", "reload", "status", "setEnvironment"];
    for method in methods {
        let replies = Arc::clone(&replies);
        harness
            .transport
            .send_method_call(COMMAND_CHANNEL, MethodCall::new(method), move |result| {
                assert!(result.is_success(), "{result:?}");
                replies.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }
    harness
        .drive_until(|| replies.load(Ordering::SeqCst) == methods.len())
        .await;

    // THEN: No extra replies show up later, and the engine saw one call per command
    harness.settle(Duration::from_millis(50)).await;
    assert_eq!(replies.load(Ordering::SeqCst), methods.len());
    assert_eq!(engine.calls().len(), methods.len());
}

/// **VALUE**: Verifies the `"{}"` default reaches the engine for start, reload and
/// setEnvironment, and that a supplied value is forwarded untouched.
#[tokio::test]
async fn given_calls_without_arguments_when_invoked_then_engine_receives_empty_object() {
    // GIVEN: A bridge over a scripted engine
    let engine = Arc::new(ScriptedEngine::default());
    let mut harness = Harness::new(slot_for(Arc::clone(&engine)));

    // WHEN: Invoking without arguments, then with an explicit empty config
    harness.invoke(MethodCall::new("start")).await;
    harness.invoke(MethodCall::new("reload")).await;
    harness.invoke(MethodCall::new("setEnvironment")).await;
    harness
        .invoke(MethodCall::new("reload").with_argument("config", ""))
        .await;

    // THEN: Defaults applied only where the argument was absent
    assert_eq!(
        engine.calls(),
        vec!["start({})", "reload({})", "setEnvironment({})", "reload()"]
    );
}

/// **VALUE**: Verifies that an unknown method is reported as not implemented and never
/// reaches the engine.
///
/// **WHY THIS MATTERS**: The UI probes for capabilities; "not implemented" is a normal
/// answer, not an error.
#[tokio::test]
async fn given_unknown_method_when_invoked_then_not_implemented_without_engine_call() {
    // GIVEN: A bridge over a scripted engine
    let engine = Arc::new(ScriptedEngine::default());
    let mut harness = Harness::new(slot_for(Arc::clone(&engine)));

    // WHEN: Invoking a bogus method
    let result = harness.invoke(MethodCall::new("bogus")).await;

    // THEN: Not implemented, engine untouched
    assert_eq!(result, CommandResult::NotImplemented);
    assert!(engine.calls().is_empty());
}

/// **VALUE**: Verifies a stop fault surfaces as CADDY_ERROR with a non-empty message.
///
/// **BUG THIS CATCHES**: Would catch the stop arm bypassing the shared fault conversion.
#[tokio::test]
async fn given_engine_failing_stop_when_stop_invoked_then_caddy_error_failure() {
    // GIVEN: An engine whose stop fails
    let engine = Arc::new(ScriptedEngine {
        fail_stop: Some(String::from("admin endpoint unreachable")),
        ..Default::default()
    });
    let mut harness = Harness::new(slot_for(engine));

    // WHEN: Invoking stop
    let result = harness.invoke(MethodCall::new("stop")).await;

    // THEN: Structured failure
    let failure = result.failure().expect("stop must fail");
    assert_eq!(failure.code, ENGINE_ERROR_CODE);
    assert_eq!(failure.message, "admin endpoint unreachable");
}

/// **VALUE**: Verifies that overlapping commands run on different workers and each reply
/// goes to the caller that sent it.
///
/// **WHY THIS MATTERS**: A slow `stop` must not block a `status` poll, and the poll must not
/// receive the stop's payload.
///
/// **BUG THIS CATCHES**: Would catch commands being serialized on a single worker (the test
/// deadlocks and times out) or replies being routed to the wrong callback.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_concurrent_status_and_stop_when_both_in_flight_then_each_caller_gets_its_result()
{
    // GIVEN: An engine where stop blocks until the test releases it
    let stop_gate = Arc::new(Gate::default());
    let engine = Arc::new(ScriptedEngine {
        stop_gate: Some(Arc::clone(&stop_gate)),
        ..Default::default()
    });
    engine.running.store(true, Ordering::SeqCst);
    let mut harness = Harness::new(slot_for(Arc::clone(&engine)));
    let ui_thread = thread::current().id();

    let stop_reply = Arc::new(Mutex::new(None));
    let status_reply = Arc::new(Mutex::new(None));

    // WHEN: Sending stop, then status while stop is still blocked
    let slot = Arc::clone(&stop_reply);
    harness
        .transport
        .send_method_call(COMMAND_CHANNEL, MethodCall::new("stop"), move |result| {
            assert_eq!(thread::current().id(), ui_thread);
            *slot.lock().unwrap() = Some(result);
        })
        .unwrap();

    let slot = Arc::clone(&status_reply);
    harness
        .transport
        .send_method_call(COMMAND_CHANNEL, MethodCall::new("status"), move |result| {
            assert_eq!(thread::current().id(), ui_thread);
            *slot.lock().unwrap() = Some(result);
        })
        .unwrap();

    // THEN: Status completes while stop is still parked
    harness
        .drive_until(|| status_reply.lock().unwrap().is_some())
        .await;
    assert_eq!(
        status_reply.lock().unwrap().clone(),
        Some(CommandResult::Success(String::from("running")))
    );
    assert!(stop_reply.lock().unwrap().is_none());
    assert_eq!(harness.host.command_channel().unwrap().in_flight(), 1);

    // AND: Releasing stop delivers its own payload to its own caller
    stop_gate.open();
    harness
        .drive_until(|| stop_reply.lock().unwrap().is_some())
        .await;
    assert_eq!(
        stop_reply.lock().unwrap().clone(),
        Some(CommandResult::Success(String::from("stopped")))
    );

    // AND: Neither engine call ran on the UI thread
    assert!(engine.call_threads().iter().all(|t| *t != ui_thread));
}

/// **VALUE**: Verifies the engine handle is created on first use and reused afterwards.
#[tokio::test]
async fn given_no_engine_yet_when_first_command_arrives_then_engine_created_once() {
    // GIVEN: A fresh slot
    let engine = Arc::new(ScriptedEngine::default());
    let slot = slot_for(engine);
    let mut harness = Harness::new(Arc::clone(&slot));
    assert!(!slot.is_initialized());

    // WHEN: Sending two commands
    harness.invoke(MethodCall::new("status")).await;
    let first = slot.get().expect("engine created by the first command");
    harness.invoke(MethodCall::new("status")).await;

    // THEN: Same handle both times
    assert!(slot.get().unwrap().ptr_eq(&first));
}
