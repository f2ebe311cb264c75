use bridge_core::error::transport::TransportError;
use bridge_core::transport::{
    CommandResult, EventSink, LogEvent, MethodCall, MethodHandler, MethodResult, StreamHandler,
    Transport,
};
use bridge_core::ui;
use bridge_core::{ENGINE_ERROR_CODE, LOG_CHANNEL};

use std::sync::{Arc, Mutex};

const TEST_CHANNEL: &str = "test/method";

/// Drops every result without answering.
struct SilentHandler;

impl MethodHandler for SilentHandler {
    fn on_method_call(&self, _call: MethodCall, _result: MethodResult) {}
}

/// Parks results so the test decides when (and whether) they complete.
#[derive(Default)]
struct ParkingHandler {
    parked: Mutex<Vec<MethodResult>>,
}

impl MethodHandler for ParkingHandler {
    fn on_method_call(&self, _call: MethodCall, result: MethodResult) {
        self.parked.lock().unwrap().push(result);
    }
}

/// Keeps the latest sink handed out by the transport.
#[derive(Default)]
struct SinkCapture {
    sink: Mutex<Option<Arc<dyn EventSink>>>,
}

impl StreamHandler for SinkCapture {
    fn on_listen(&self, sink: Arc<dyn EventSink>) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    fn on_cancel(&self) {
        *self.sink.lock().unwrap() = None;
    }
}

/// **VALUE**: Verifies calls to an unregistered channel fail immediately.
#[test]
fn given_no_handler_when_call_sent_then_returns_missing_handler() {
    // GIVEN: An empty transport
    let (context, _ui_loop) = ui::channel();
    let transport = Transport::new(context);

    // WHEN: Sending a call
    let result = transport.send_method_call(TEST_CHANNEL, MethodCall::new("x"), |_| {});

    // THEN: Missing handler
    assert!(matches!(result, Err(TransportError::MissingHandler { .. })));
}

/// **VALUE**: Verifies a destroyed transport refuses calls and new handlers.
#[test]
fn given_destroyed_transport_when_used_then_refuses() {
    // GIVEN: A transport with a handler, then destroyed
    let (context, _ui_loop) = ui::channel();
    let transport = Transport::new(context);
    transport.set_method_handler(TEST_CHANNEL, Some(Arc::new(SilentHandler)));
    transport.destroy();
    transport.destroy();

    // WHEN: Sending and registering
    let result = transport.send_method_call(TEST_CHANNEL, MethodCall::new("x"), |_| {});
    transport.set_method_handler(TEST_CHANNEL, Some(Arc::new(SilentHandler)));

    // THEN: Both refused
    assert!(matches!(result, Err(TransportError::Destroyed { .. })));
    assert!(!transport.has_method_handler(TEST_CHANNEL));
}

/// **VALUE**: Verifies a handler that drops its result still resolves the call.
///
/// **WHY THIS MATTERS**: The UI awaits every call. A forgotten result must become a visible
/// failure, not a hang.
///
/// **BUG THIS CATCHES**: Would catch the `Drop` fallback on `MethodResult` being removed.
#[tokio::test]
async fn given_handler_dropping_result_when_invoked_then_resolves_with_failure() {
    // GIVEN: A handler that never answers
    let (context, mut ui_loop) = ui::channel();
    let transport = Transport::new(context);
    transport.set_method_handler(TEST_CHANNEL, Some(Arc::new(SilentHandler)));

    // WHEN: Invoking
    let call = transport.invoke_method(TEST_CHANNEL, MethodCall::new("forgotten"));
    let result = ui_loop.run_until(call).await.unwrap();

    // THEN: A CADDY_ERROR failure naming the method
    let failure = result.failure().expect("dropped result is a failure");
    assert_eq!(failure.code, ENGINE_ERROR_CODE);
    assert!(failure.message.contains("forgotten"));
}

/// **VALUE**: Verifies a result completed after destroy is absorbed and the awaiting caller
/// sees `ReplyDropped` rather than hanging.
#[tokio::test]
async fn given_parked_result_when_completed_after_destroy_then_reply_dropped() {
    // GIVEN: A call whose result is parked
    let (context, mut ui_loop) = ui::channel();
    let transport = Transport::new(context);
    let handler = Arc::new(ParkingHandler::default());
    transport.set_method_handler(TEST_CHANNEL, Some(Arc::clone(&handler) as Arc<dyn MethodHandler>));

    let invoke = transport.invoke_method(TEST_CHANNEL, MethodCall::new("late"));

    // WHEN: Destroying, then completing, once the call is in the handler
    let complete_late = async {
        tokio::task::yield_now().await;
        transport.destroy();
        for result in handler.parked.lock().unwrap().drain(..) {
            result.success("too late");
        }
    };

    // THEN: The reply is absorbed
    let (outcome, ()) = ui_loop
        .run_until(async { tokio::join!(invoke, complete_late) })
        .await;
    assert!(matches!(outcome, Err(TransportError::ReplyDropped { .. })));
}

/// **VALUE**: Verifies a second `listen` replaces the first and stale sinks go quiet.
///
/// **BUG THIS CATCHES**: Would catch events from the first subscription's sink still being
/// delivered to the new listener.
#[tokio::test]
async fn given_two_listens_when_old_sink_publishes_then_event_absorbed() {
    // GIVEN: A stream handler and two listens in turn
    let (context, mut ui_loop) = ui::channel();
    let transport = Transport::new(context);
    let capture = Arc::new(SinkCapture::default());
    transport.set_stream_handler(LOG_CHANNEL, Some(Arc::clone(&capture) as Arc<dyn StreamHandler>));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let first_seen = Arc::clone(&seen);
    transport
        .listen(LOG_CHANNEL, move |e: LogEvent| {
            first_seen.lock().unwrap().push(format!("first:{e}"))
        })
        .unwrap();
    let old_sink = capture.sink.lock().unwrap().clone().unwrap();

    let second_seen = Arc::clone(&seen);
    transport
        .listen(LOG_CHANNEL, move |e: LogEvent| {
            second_seen.lock().unwrap().push(format!("second:{e}"))
        })
        .unwrap();
    let new_sink = capture.sink.lock().unwrap().clone().unwrap();

    // WHEN: Both sinks publish
    old_sink.success(LogEvent::from("a"));
    new_sink.success(LogEvent::from("b"));
    ui_loop.run_pending();

    // THEN: Only the current subscription delivered
    assert_eq!(*seen.lock().unwrap(), vec!["second:b"]);

    // AND: Cancel reaches the handler
    assert!(transport.cancel(LOG_CHANNEL));
    assert!(capture.sink.lock().unwrap().is_none());
    assert!(!transport.cancel(LOG_CHANNEL));
}

/// **VALUE**: Verifies NotImplemented survives the trip through the transport.
#[tokio::test]
async fn given_not_implemented_result_when_invoked_then_caller_sees_not_implemented() {
    // GIVEN: A handler that answers not implemented
    struct Unsupported;
    impl MethodHandler for Unsupported {
        fn on_method_call(&self, _call: MethodCall, result: MethodResult) {
            result.not_implemented();
        }
    }
    let (context, mut ui_loop) = ui::channel();
    let transport = Transport::new(context);
    transport.set_method_handler(TEST_CHANNEL, Some(Arc::new(Unsupported)));

    // WHEN: Invoking
    let call = transport.invoke_method(TEST_CHANNEL, MethodCall::new("anything"));
    let result = ui_loop.run_until(call).await.unwrap();

    // THEN: Not implemented
    assert_eq!(result, CommandResult::NotImplemented);
}
