use caddy_shell::console::{Console, HELP_TEXT};
use caddy_shell::error::ShellError;
use caddy_shell::logger::initialize as LoggerInitialize;
use caddy_shell::paths::detect_shell_paths;
use caddy_shell::surface::{Output, Surface};

use bridge_core::channel::Command;
use bridge_core::config::BridgeConfig;
use bridge_core::engine::EngineSlot;
use bridge_core::host::BridgeHost;
use bridge_core::transport::MethodCall;
use bridge_core::ui::{self, UiContext};

use common::ErrorLocation;

use std::collections::VecDeque;
use std::fs::create_dir_all;
use std::io::{BufRead, stdin};
use std::panic::Location;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{error, info, warn};

const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), ShellError> {
    let paths = detect_shell_paths()?;

    create_dir_all(&paths.log_dir).map_err(|e| ShellError::Shell {
        message: format!("Failed to create log directory: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let config = BridgeConfig::load(&paths.config_dir).map_err(|e| ShellError::Bridge {
        message: e.to_string(),
        location: ErrorLocation::from(Location::caller()),
    })?;

    // Initialize logger FIRST
    LoggerInitialize(&paths.log_dir, config.level_filter())?;

    info!("Caddy shell starting");
    info!("Config directory: {} ({})", paths.config_dir.display(), paths.source);
    info!("Log directory: {}", paths.log_dir.display());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .max_blocking_threads(config.workers.max_blocking_threads)
        .enable_all()
        .build()
        .map_err(|e| ShellError::Shell {
            message: format!("Failed to build worker runtime: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    let (ui, mut ui_loop) = ui::channel();
    let engine = Arc::new(EngineSlot::local());
    let mut host = BridgeHost::new(Arc::clone(&engine), runtime.handle().clone());

    let output: Output = Arc::new(|line: String| println!("{line}"));
    let surface = Surface::open(ui.clone(), output);

    host.attach(surface.transport()).map_err(|e| ShellError::Bridge {
        message: e.to_string(),
        location: ErrorLocation::from(Location::caller()),
    })?;
    surface.subscribe_logs()?;

    surface.print(HELP_TEXT);
    surface.dispatch_sequence(startup_calls(&config)?)?;

    let console = Arc::new(Console::new(surface.clone(), ui.clone()));
    spawn_stdin_reader(console, ui);

    ui_loop.run_blocking();

    // Handlers go before the surface, the surface before the engine.
    host.detach();
    surface.close();
    if let Err(e) = engine.teardown() {
        warn!("Engine did not stop cleanly: {e}");
    }
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);

    info!("Caddy shell exited");
    Ok(())
}

/// Commands sent before the console takes over: environment first, then auto start.
fn startup_calls(config: &BridgeConfig) -> Result<VecDeque<MethodCall>, ShellError> {
    let to_shell_error = |e: bridge_core::error::config::ConfigError| ShellError::Bridge {
        message: e.to_string(),
        location: ErrorLocation::from(Location::caller()),
    };

    let mut calls = VecDeque::new();

    if let Some(env) = config.load_environment().map_err(to_shell_error)? {
        calls.push_back(Command::SetEnvironment { env }.to_call());
    }

    if config.engine.auto_start {
        let call = match config.read_engine_config().map_err(to_shell_error)? {
            Some(config) => Command::Start { config }.to_call(),
            None => MethodCall::new("start"),
        };
        calls.push_back(call);
    }

    Ok(calls)
}

/// Read stdin on its own thread and post each line to the UI thread.
/// End of input quits.
fn spawn_stdin_reader(console: Arc<Console>, ui: UiContext) {
    thread::spawn(move || {
        for line in stdin().lock().lines() {
            match line {
                Ok(line) => {
                    let console = Arc::clone(&console);
                    if !ui.post(move || console.handle_line(&line)) {
                        return;
                    }
                }
                Err(e) => {
                    error!("Failed to read console input: {e}");
                    break;
                }
            }
        }
        ui.quit();
    });
}
