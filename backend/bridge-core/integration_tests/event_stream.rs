use bridge_core::LOG_CHANNEL;
use bridge_core::channel::EventStream;
use bridge_core::transport::{EventSink, LogEvent, Transport};
use bridge_core::ui;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn recording_sink() -> (Arc<dyn EventSink>, Arc<Mutex<Vec<String>>>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&lines);
    let sink: Arc<dyn EventSink> =
        Arc::new(move |event: LogEvent| captured.lock().unwrap().push(event.into_string()));
    (sink, lines)
}

fn stream() -> (EventStream, Transport) {
    let (context, _ui_loop) = ui::channel();
    let transport = Transport::new(context);
    (EventStream::register(&transport), transport)
}

/// **VALUE**: Verifies that attaching a second sink replaces the first.
///
/// **WHY THIS MATTERS**: A UI surface that is recreated subscribes again without cancelling
/// first. The new surface must get the logs and the old one must not.
///
/// **BUG THIS CATCHES**: Would catch a sink list instead of a single slot, or an error on
/// re-attach.
#[test]
fn given_two_sinks_attached_when_published_then_only_last_receives() {
    // GIVEN: Two sinks attached in turn
    let (stream, transport) = stream();
    let (first, first_lines) = recording_sink();
    let (second, second_lines) = recording_sink();
    stream.attach(first);
    stream.attach(second);

    // WHEN: Publishing
    stream.publish("hello");

    // THEN: Only the last sink saw it
    assert!(first_lines.lock().unwrap().is_empty());
    assert_eq!(*second_lines.lock().unwrap(), vec!["hello"]);
    assert!(transport.has_stream_handler(LOG_CHANNEL));
}

/// **VALUE**: Verifies publishing with nobody attached is a silent drop, and nothing is
/// buffered for a later subscriber.
#[test]
fn given_no_sink_when_published_then_dropped_and_not_replayed() {
    // GIVEN: A stream with no sink
    let (stream, _transport) = stream();

    // WHEN: Publishing, then attaching
    stream.publish("early line");
    let (sink, lines) = recording_sink();
    stream.attach(sink);

    // THEN: The early line is gone
    assert!(lines.lock().unwrap().is_empty());
}

/// **VALUE**: Verifies detach is idempotent and publish after detach reaches nothing.
///
/// **BUG THIS CATCHES**: Would catch a detach that panics on an empty slot, or a publish that
/// still reaches a detached sink.
#[test]
fn given_detached_stream_when_detached_again_and_published_then_nothing_happens() {
    // GIVEN: An attached sink
    let (stream, _transport) = stream();
    let (sink, lines) = recording_sink();
    stream.attach(sink);

    // WHEN: Detaching twice and publishing
    stream.detach();
    stream.detach();
    stream.publish("after detach");

    // THEN: Nothing delivered, nothing attached
    assert!(lines.lock().unwrap().is_empty());
    assert!(!stream.is_attached());
}

/// **VALUE**: Verifies that once `detach()` returns, a publisher on another thread can no
/// longer reach the old sink.
///
/// **WHY THIS MATTERS**: The engine logs from its own threads. After the surface detaches,
/// the old sink's UI objects may already be gone.
///
/// **BUG THIS CATCHES**: Would catch publish cloning the sink out of the lock and delivering
/// after a concurrent detach has returned.
#[test]
fn given_publisher_thread_when_detached_then_no_delivery_after_detach_returns() {
    // GIVEN: A sink and a thread publishing in a tight loop
    let (stream, _transport) = stream();
    let (sink, lines) = recording_sink();
    stream.attach(sink);

    let publish = stream.publisher();
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    let publisher = thread::spawn(move || {
        let mut i = 0u64;
        while !stop_flag.load(Ordering::SeqCst) {
            publish(LogEvent::new(format!("line {i}")));
            i += 1;
        }
    });
    thread::sleep(Duration::from_millis(20));

    // WHEN: Detaching while the publisher keeps going
    stream.detach();
    let at_detach = lines.lock().unwrap().len();
    thread::sleep(Duration::from_millis(20));
    stop.store(true, Ordering::SeqCst);
    publisher.join().unwrap();

    // THEN: The sink saw nothing after detach returned
    assert!(at_detach > 0, "publisher should have delivered before detach");
    assert_eq!(lines.lock().unwrap().len(), at_detach);
}

/// **VALUE**: Verifies events from one publisher keep their emission order.
#[test]
fn given_sequential_events_when_published_then_delivered_in_order() {
    // GIVEN: An attached sink
    let (stream, _transport) = stream();
    let (sink, lines) = recording_sink();
    stream.attach(sink);

    // WHEN: Publishing from a worker thread
    let publish = stream.publisher();
    thread::spawn(move || {
        for i in 0..100 {
            publish(LogEvent::new(i.to_string()));
        }
    })
    .join()
    .unwrap();

    // THEN: Order preserved
    let expected: Vec<String> = (0..100).map(|i| i.to_string()).collect();
    assert_eq!(*lines.lock().unwrap(), expected);
}

/// **VALUE**: Verifies dispose clears the transport registration and the sink.
#[test]
fn given_registered_stream_when_disposed_then_handler_and_sink_cleared() {
    // GIVEN: A registered stream with a sink
    let (stream, transport) = stream();
    let (sink, _) = recording_sink();
    stream.attach(sink);

    // WHEN: Disposing
    stream.dispose();

    // THEN: Both gone
    assert!(!transport.has_stream_handler(LOG_CHANNEL));
    assert!(!stream.is_attached());
}
