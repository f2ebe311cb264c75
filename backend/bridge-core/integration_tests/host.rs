use crate::helpers::{Gate, Harness, ScriptedEngine, slot_for};

use bridge_core::error::transport::TransportError;
use bridge_core::host::{BridgeHost, HostState};
use bridge_core::transport::{CommandResult, LogEvent, MethodCall};
use bridge_core::{COMMAND_CHANNEL, LOG_CHANNEL};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;

/// **VALUE**: Verifies attach registers both handlers and routes engine logs to the listener.
#[tokio::test]
async fn given_new_host_when_attached_then_both_channels_registered() {
    // GIVEN / WHEN: A harness (which attaches on creation)
    let engine = Arc::new(ScriptedEngine::default());
    let harness = Harness::new(slot_for(engine));

    // THEN: Both channels are live
    assert_eq!(harness.host.state(), HostState::Attached);
    assert!(harness.transport.has_method_handler(COMMAND_CHANNEL));
    assert!(harness.transport.has_stream_handler(LOG_CHANNEL));
}

/// **VALUE**: Verifies that attaching twice to the same surface changes nothing.
///
/// **WHY THIS MATTERS**: Surface-ready callbacks can fire more than once. Re-registering
/// would drop the existing subscription and the user's log view would go quiet.
///
/// **BUG THIS CATCHES**: Would catch attach unconditionally rebuilding the channels.
#[tokio::test]
async fn given_attached_host_when_attached_to_same_transport_then_subscription_survives() {
    // GIVEN: An attached host with a live log listener
    let engine = Arc::new(ScriptedEngine::default());
    let mut harness = Harness::new(slot_for(Arc::clone(&engine)));
    harness.invoke(MethodCall::new("status")).await;
    let lines = harness.listen_logs();

    // WHEN: Attaching to the same transport again
    let transport = harness.transport.clone();
    harness.host.attach(&transport).unwrap();
    engine.emit("still here");

    // THEN: Still attached and the listener still receives exactly one copy
    harness.drive_until(|| !lines.lock().unwrap().is_empty()).await;
    harness.settle(Duration::from_millis(20)).await;
    assert_eq!(harness.host.state(), HostState::Attached);
    assert_eq!(*lines.lock().unwrap(), vec!["still here"]);
}

/// **VALUE**: Verifies that moving to a new surface clears the old one first and keeps the
/// engine.
///
/// **WHY THIS MATTERS**: The engine keeps serving while the UI is recreated. Only the
/// handlers move.
///
/// **BUG THIS CATCHES**: Would catch handlers left on the old transport (a leak that keeps the
/// old surface alive) or a new engine being created on reattach.
#[tokio::test]
async fn given_attached_host_when_attached_to_new_transport_then_old_is_cleared() {
    // GIVEN: An attached host whose engine is running
    let engine = Arc::new(ScriptedEngine::default());
    let slot = slot_for(Arc::clone(&engine));
    let mut harness = Harness::new(Arc::clone(&slot));
    harness.invoke(MethodCall::new("start")).await;
    let handle = slot.get().unwrap();
    let old_transport = harness.transport.clone();

    // WHEN: Attaching to a new surface
    let new_transport = harness.new_transport();
    harness.host.attach(&new_transport).unwrap();
    harness.transport = new_transport.clone();

    // THEN: Handlers moved
    assert!(!old_transport.has_method_handler(COMMAND_CHANNEL));
    assert!(!old_transport.has_stream_handler(LOG_CHANNEL));
    assert!(new_transport.has_method_handler(COMMAND_CHANNEL));
    assert!(new_transport.has_stream_handler(LOG_CHANNEL));

    // AND: Same engine, still running, reachable from the new surface
    let status = harness.invoke(MethodCall::new("status")).await;
    assert_eq!(status, CommandResult::Success(String::from("running")));
    assert!(slot.get().unwrap().ptr_eq(&handle));
}

/// **VALUE**: Verifies detach clears handlers and log routing but leaves the engine alone,
/// and that a second detach is a no-op.
#[tokio::test]
async fn given_attached_host_when_detached_twice_then_cleared_once_and_engine_untouched() {
    // GIVEN: An attached host with a created engine
    let engine = Arc::new(ScriptedEngine::default());
    let slot = slot_for(Arc::clone(&engine));
    let mut harness = Harness::new(Arc::clone(&slot));
    harness.invoke(MethodCall::new("start")).await;
    assert!(engine.has_sink());

    // WHEN: Detaching twice
    harness.host.detach();
    harness.host.detach();

    // THEN: Handlers and log routing gone
    assert_eq!(harness.host.state(), HostState::Detached);
    assert!(!harness.transport.has_method_handler(COMMAND_CHANNEL));
    assert!(!harness.transport.has_stream_handler(LOG_CHANNEL));
    assert!(!engine.has_sink());
    assert!(harness.host.command_channel().is_none());

    // AND: The engine is still there and still running
    assert!(slot.is_initialized());
    assert!(engine.running.load(Ordering::SeqCst));
    assert!(!engine.calls().contains(&String::from("stop()")));
}

/// **VALUE**: Verifies a host refuses a surface that is already destroyed.
#[tokio::test]
async fn given_destroyed_transport_when_attached_then_returns_destroyed_error() {
    // GIVEN: A fresh host and a destroyed transport
    let engine = Arc::new(ScriptedEngine::default());
    let harness = Harness::new(slot_for(Arc::clone(&engine)));
    let mut host = BridgeHost::new(slot_for(engine), Handle::current());
    let transport = harness.new_transport();
    transport.destroy();

    // WHEN: Attaching
    let result = host.attach(&transport);

    // THEN: Refused, host untouched
    assert!(matches!(result, Err(TransportError::Destroyed { .. })));
    assert_eq!(host.state(), HostState::Uninitialized);
}

/// **VALUE**: Verifies that a reply and log lines arriving after the surface is torn down
/// are absorbed.
///
/// **WHY THIS MATTERS**: A slow engine call can finish after the user closed the window.
/// Delivering into a destroyed surface is a use-after-free in a real UI toolkit.
///
/// **BUG THIS CATCHES**: Would catch `MethodResult` delivering without checking the
/// transport, or a panic on the late path.
#[tokio::test]
async fn given_in_flight_command_when_surface_torn_down_then_late_reply_absorbed() {
    // GIVEN: A status call parked inside the engine
    let gate = Arc::new(Gate::default());
    let engine = Arc::new(ScriptedEngine {
        status_gate: Some(Arc::clone(&gate)),
        ..Default::default()
    });
    let mut harness = Harness::new(slot_for(Arc::clone(&engine)));
    let delivered = Arc::new(AtomicBool::new(false));
    let late_lines: Arc<Mutex<Vec<String>>> = harness.listen_logs();

    let flag = Arc::clone(&delivered);
    harness
        .transport
        .send_method_call(COMMAND_CHANNEL, MethodCall::new("status"), move |_| {
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();
    harness
        .drive_until(|| engine.calls().contains(&String::from("status()")))
        .await;

    // WHEN: Tearing the surface down, then letting the engine finish and log
    harness.host.detach();
    harness.transport.destroy();
    engine.emit("late line");
    gate.open();
    harness.settle(Duration::from_millis(100)).await;

    // THEN: Neither the reply nor the log line reached the UI
    assert!(!delivered.load(Ordering::SeqCst));
    assert!(late_lines.lock().unwrap().is_empty());
}

/// **VALUE**: Verifies that a detached host can attach again and gets exactly one live pair of
/// channels.
///
/// **WHY THIS MATTERS**: Mobile UIs destroy and recreate their surface while the engine keeps
/// running. The second attach must leave the bridge as usable as the first.
///
/// **BUG THIS CATCHES**: Would catch a host stuck in `Detached`, or handlers registered twice
/// so each log line is delivered more than once.
#[tokio::test]
async fn given_detached_host_when_attached_again_then_channels_registered_once() {
    // GIVEN: A host that attached, created the engine and detached
    let engine = Arc::new(ScriptedEngine::default());
    let mut harness = Harness::new(slot_for(Arc::clone(&engine)));
    harness.invoke(MethodCall::new("status")).await;
    harness.host.detach();
    assert_eq!(harness.host.state(), HostState::Detached);

    // WHEN: Attaching to the same surface again
    let transport = harness.transport.clone();
    harness.host.attach(&transport).unwrap();
    let lines = harness.listen_logs();
    engine.emit("after reattach");

    // THEN: Attached with both handlers back
    assert_eq!(harness.host.state(), HostState::Attached);
    assert!(transport.has_method_handler(COMMAND_CHANNEL));
    assert!(transport.has_stream_handler(LOG_CHANNEL));

    // AND: The log line arrives once
    harness.drive_until(|| !lines.lock().unwrap().is_empty()).await;
    harness.settle(Duration::from_millis(20)).await;
    assert_eq!(*lines.lock().unwrap(), vec!["after reattach"]);

    // AND: Commands work again
    let status = harness.invoke(MethodCall::new("status")).await;
    assert_eq!(status, CommandResult::Success(String::from("stopped")));
}

/// **VALUE**: Verifies that when two hosts share one engine, the older host detaching leaves
/// the newer host's log routing in place.
///
/// **WHY THIS MATTERS**: The engine slot is process-wide. Whichever surface attached last
/// receives engine logs, and an older surface closing must not silence it.
///
/// **BUG THIS CATCHES**: Would catch detach clearing the engine's log sink without checking
/// that the sink is its own.
#[tokio::test]
async fn given_two_hosts_on_one_engine_when_older_detaches_then_newer_still_gets_logs() {
    // GIVEN: Host A started the engine, then host B attached to a second surface and listens
    let engine = Arc::new(ScriptedEngine::default());
    let slot = slot_for(Arc::clone(&engine));
    let mut harness = Harness::new(Arc::clone(&slot));
    harness.invoke(MethodCall::new("start")).await;

    let transport_b = harness.new_transport();
    let mut host_b = BridgeHost::new(Arc::clone(&slot), Handle::current());
    host_b.attach(&transport_b).unwrap();
    let lines_b = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&lines_b);
    transport_b
        .listen(LOG_CHANNEL, move |event: LogEvent| {
            captured.lock().unwrap().push(event.into_string())
        })
        .unwrap();

    // WHEN: Host A detaches and the engine logs
    harness.host.detach();
    engine.emit("for B");

    // THEN: B is still attached and receives the line
    harness.drive_until(|| !lines_b.lock().unwrap().is_empty()).await;
    assert_eq!(host_b.state(), HostState::Attached);
    assert!(engine.has_sink());
    assert_eq!(*lines_b.lock().unwrap(), vec!["for B"]);

    // AND: Once B detaches too, the engine is unrouted
    host_b.detach();
    assert!(!engine.has_sink());
}
