// Unit tests for logger module initialization logic
// Tests focus on thread-safety and error handling

use crate::error::ShellError;
use crate::logger::{LOG_FILE_NAME, build_dispatch, initialize};

use std::path::PathBuf;

use log::LevelFilter;
use tempfile::TempDir;

/// **VALUE**: Verifies that calling initialize() multiple times doesn't panic or fail.
///
/// **WHY THIS MATTERS**: Initialization might be reached from more than one code path
/// (startup, tests). A second call must not try to install a second global logger.
///
/// **BUG THIS CATCHES**: Would catch if the Once or AtomicBool guards are removed,
/// causing fern to fail when trying to set a global logger twice.
#[test]
fn given_logger_initialized_when_called_again_then_returns_ok() {
    // GIVEN: A valid temporary directory
    let temp_dir = TempDir::new().unwrap();

    // WHEN: Calling initialize twice
    let result1 = initialize(temp_dir.path(), LevelFilter::Debug);
    let result2 = initialize(temp_dir.path(), LevelFilter::Debug);

    // THEN: Both return Ok and the log file exists
    assert!(result1.is_ok(), "First initialization should succeed");
    assert!(
        result2.is_ok(),
        "Second initialization should succeed (idempotent)"
    );
    assert!(temp_dir.path().join(LOG_FILE_NAME).exists());
}

/// **VALUE**: Verifies that an unusable log directory is an error, not a panic.
///
/// **WHY THIS MATTERS**: If the data directory can't be written (permissions, disk full),
/// the shell should report why instead of crashing at startup.
///
/// **BUG THIS CATCHES**: Would catch if `fern::log_file()` is unwrapped instead of mapped
/// into a `ShellError`.
#[test]
fn given_invalid_log_dir_when_dispatch_built_then_returns_shell_error() {
    // GIVEN: A path that cannot hold a file on Unix-like systems
    let invalid_dir = PathBuf::from("/dev/null/invalid-path");

    // WHEN: Building the dispatch
    let result = build_dispatch(&invalid_dir, LevelFilter::Info);

    // THEN: Shell error
    assert!(matches!(result, Err(ShellError::Shell { .. })));
}
