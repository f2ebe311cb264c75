use caddy_shell::console::Console;
use caddy_shell::surface::{Output, Surface};

use bridge_core::engine::EngineSlot;
use bridge_core::host::BridgeHost;
use bridge_core::transport::MethodCall;
use bridge_core::ui::{self, UiLoop};
use bridge_core::{COMMAND_CHANNEL, LOG_CHANNEL};

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::runtime::Handle;

// ============================================================================
// Console + surface + bridge, wired the way main.rs wires them
// ============================================================================

struct Shell {
    ui_loop: UiLoop,
    console: Console,
    host: BridgeHost,
    engine: Arc<EngineSlot>,
    printed: Arc<Mutex<Vec<String>>>,
}

impl Shell {
    fn new() -> Self {
        let (ui, ui_loop) = ui::channel();
        let printed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&printed);
        let output: Output = Arc::new(move |line: String| sink.lock().unwrap().push(line));

        let engine = Arc::new(EngineSlot::local());
        let mut host = BridgeHost::new(Arc::clone(&engine), Handle::current());
        let surface = Surface::open(ui.clone(), output);
        host.attach(surface.transport()).unwrap();
        surface.subscribe_logs().unwrap();

        Self {
            ui_loop,
            console: Console::new(surface, ui),
            host,
            engine,
            printed,
        }
    }

    fn printed(&self) -> Vec<String> {
        self.printed.lock().unwrap().clone()
    }

    async fn drive_until(&mut self, mut done: impl FnMut(&[String]) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(&self.printed()) {
            assert!(Instant::now() < deadline, "output not seen: {:?}", self.printed());
            self.ui_loop
                .run_until(tokio::time::sleep(Duration::from_millis(5)))
                .await;
        }
    }
}

/// **VALUE**: Verifies a console session: start, status, an unknown word, stop.
///
/// **WHY THIS MATTERS**: This is the shell's whole job. Results and engine log lines must
/// both reach the output, and unknown words must come back as "not implemented".
///
/// **BUG THIS CATCHES**: Would catch the log subscription not being wired, results rendered
/// off the UI thread path, or the console swallowing unknown words.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_console_session_when_lines_entered_then_results_and_logs_printed() {
    // GIVEN: A wired shell
    let mut shell = Shell::new();

    // WHEN: Starting
    shell.console.handle_line("start");
    shell
        .drive_until(|out| out.iter().any(|l| l.starts_with("start:")))
        .await;

    // THEN: Result and the engine's log line are printed
    let out = shell.printed();
    assert!(out.contains(&String::from(r#"start: {"status":"running"}"#)));
    assert!(
        out.iter()
            .any(|l| l.starts_with("[engine] ") && l.contains("serving initial configuration"))
    );

    // WHEN: Asking for status and sending an unknown word
    shell.console.handle_line("status");
    shell.console.handle_line("bogus");
    shell
        .drive_until(|out| {
            out.iter().any(|l| l.starts_with("status:"))
                && out.iter().any(|l| l == "bogus: not implemented")
        })
        .await;

    // WHEN: Stopping
    shell.console.handle_line("stop");
    shell
        .drive_until(|out| out.contains(&String::from(r#"stop: {"status":"stopped"}"#)))
        .await;

    // THEN: The engine is stopped but still exists
    assert!(shell.engine.is_initialized());
}

/// **VALUE**: Verifies startup sequencing: setEnvironment completes before start is sent.
///
/// **WHY THIS MATTERS**: Commands run on independent workers. Sent together, start could
/// reach the engine before its environment.
#[tokio::test]
async fn given_startup_calls_when_sequenced_then_run_in_order() {
    // GIVEN: A wired shell and two startup calls
    let mut shell = Shell::new();
    let calls = VecDeque::from([
        MethodCall::new("setEnvironment").with_argument("env", r#"{"ACME_EMAIL":"a@b.c"}"#),
        MethodCall::new("start"),
    ]);

    // WHEN: Dispatching as a sequence
    shell.console.surface().dispatch_sequence(calls).unwrap();
    shell
        .drive_until(|out| out.iter().any(|l| l.starts_with("start:")))
        .await;

    // THEN: setEnvironment's reply printed before start's
    let out = shell.printed();
    let env_at = out.iter().position(|l| l.starts_with("setEnvironment:")).unwrap();
    let start_at = out.iter().position(|l| l.starts_with("start:")).unwrap();
    assert!(env_at < start_at);
}

/// **VALUE**: Verifies `logs off` silences engine lines while results keep printing.
#[tokio::test]
async fn given_logs_off_when_engine_logs_then_only_results_printed() {
    // GIVEN: A wired shell with logs turned off
    let mut shell = Shell::new();
    shell.console.handle_line("logs off");

    // WHEN: Starting
    shell.console.handle_line("start");
    shell
        .drive_until(|out| out.iter().any(|l| l.starts_with("start:")))
        .await;

    // THEN: No engine lines
    assert!(!shell.printed().iter().any(|l| l.starts_with("[engine] ")));
}

/// **VALUE**: Verifies the exit order leaves nothing registered and quits the loop.
#[tokio::test]
async fn given_quit_when_shell_exits_then_surface_clean_and_loop_stops() {
    // GIVEN: A wired shell
    let mut shell = Shell::new();
    let transport = shell.console.surface().transport().clone();

    // WHEN: Quitting and running the exit sequence
    shell.console.handle_line("quit");
    shell.ui_loop.run_until_quit().await;
    shell.host.detach();
    shell.console.surface().close();
    shell.engine.teardown().unwrap();

    // THEN: Loop stopped, handlers gone before destroy, engine released
    assert!(shell.ui_loop.is_quit_requested());
    assert!(!transport.has_method_handler(COMMAND_CHANNEL));
    assert!(!transport.has_stream_handler(LOG_CHANNEL));
    assert!(transport.is_destroyed());
    assert!(!shell.engine.is_initialized());
}

/// **VALUE**: Verifies input errors are printed rather than sent.
#[tokio::test]
async fn given_malformed_env_when_entered_then_error_printed() {
    // GIVEN: A wired shell
    let shell = Shell::new();

    // WHEN: Entering a bad env line
    shell.console.handle_line("env NOPE");

    // THEN: An error line is printed immediately
    assert!(shell.printed().iter().any(|l| l.starts_with("error: ")));
}
