use crate::console::{ConsoleInput, parse_line, render_result};
use crate::error::ShellError;

use bridge_core::transport::{CommandFailure, CommandResult, MethodCall};

use serde_json::Value;
use tempfile::TempDir;

/// **VALUE**: Verifies that bare `start` and `reload` omit the config so the bridge default
/// applies.
///
/// **BUG THIS CATCHES**: Would catch the console sending `config=""`, which the engine
/// rejects as invalid JSON.
#[test]
fn given_bare_start_and_reload_when_parsed_then_no_config_argument() {
    // GIVEN / WHEN: Bare commands
    let start = parse_line("start").unwrap();
    let reload = parse_line("  reload  ").unwrap();

    // THEN: Calls without arguments
    assert_eq!(start, ConsoleInput::Call(MethodCall::new("start")));
    assert_eq!(reload, ConsoleInput::Call(MethodCall::new("reload")));
}

/// **VALUE**: Verifies `start <file>` sends the file contents as the config.
#[test]
fn given_start_with_file_when_parsed_then_config_is_file_contents() {
    // GIVEN: A config file
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("caddy.json");
    std::fs::write(&path, r#"{"apps":{}}"#).unwrap();

    // WHEN: Parsing
    let input = parse_line(&format!("start {}", path.display())).unwrap();

    // THEN: The contents travel as `config`
    let ConsoleInput::Call(call) = input else {
        panic!("expected a call");
    };
    assert_eq!(call.method, "start");
    assert_eq!(call.argument("config"), Some(r#"{"apps":{}}"#));
}

/// **VALUE**: Verifies missing files and extra words are input errors.
#[test]
fn given_bad_start_arguments_when_parsed_then_returns_input_error() {
    // GIVEN / WHEN / THEN
    assert!(matches!(
        parse_line("start /definitely/not/here.json"),
        Err(ShellError::Input { .. })
    ));
    assert!(matches!(
        parse_line("reload a.json b.json"),
        Err(ShellError::Input { .. })
    ));
}

/// **VALUE**: Verifies `env` pairs become a JSON object and values may contain `=`.
///
/// **WHY THIS MATTERS**: Tokens and URLs commonly contain `=`; only the first one splits.
#[test]
fn given_env_pairs_when_parsed_then_builds_json_object() {
    // GIVEN / WHEN
    let input = parse_line("env CF_API_TOKEN=abc== ACME_EMAIL=ops@example.com").unwrap();

    // THEN
    let ConsoleInput::Call(call) = input else {
        panic!("expected a call");
    };
    assert_eq!(call.method, "setEnvironment");
    let env: Value = serde_json::from_str(call.argument("env").unwrap()).unwrap();
    assert_eq!(env["CF_API_TOKEN"], "abc==");
    assert_eq!(env["ACME_EMAIL"], "ops@example.com");
}

/// **VALUE**: Verifies malformed `env` input is rejected before reaching the bridge.
#[test]
fn given_malformed_env_when_parsed_then_returns_input_error() {
    for line in ["env", "env TOKEN", "env =value"] {
        assert!(
            matches!(parse_line(line), Err(ShellError::Input { .. })),
            "'{line}' should be rejected"
        );
    }
}

/// **VALUE**: Verifies unknown words are forwarded as method calls with KEY=VALUE arguments.
///
/// **WHY THIS MATTERS**: The bridge, not the console, decides what is implemented.
#[test]
fn given_unknown_word_when_parsed_then_forwarded_verbatim() {
    // GIVEN / WHEN
    let input = parse_line("adapt format=caddyfile").unwrap();

    // THEN
    assert_eq!(
        input,
        ConsoleInput::Call(MethodCall::new("adapt").with_argument("format", "caddyfile"))
    );
}

/// **VALUE**: Verifies the console-only words.
#[test]
fn given_console_words_when_parsed_then_map_to_console_inputs() {
    assert_eq!(parse_line("").unwrap(), ConsoleInput::Empty);
    assert_eq!(parse_line("   ").unwrap(), ConsoleInput::Empty);
    assert_eq!(parse_line("help").unwrap(), ConsoleInput::Help);
    assert_eq!(parse_line("quit").unwrap(), ConsoleInput::Quit);
    assert_eq!(parse_line("exit").unwrap(), ConsoleInput::Quit);
    assert_eq!(parse_line("logs on").unwrap(), ConsoleInput::Logs(true));
    assert_eq!(parse_line("logs off").unwrap(), ConsoleInput::Logs(false));
    assert!(parse_line("logs maybe").is_err());
}

/// **VALUE**: Verifies each result kind renders distinctly, failures with their code.
#[test]
fn given_each_result_kind_when_rendered_then_text_identifies_outcome() {
    let success = CommandResult::Success(String::from(r#"{"status":"running"}"#));
    let failure = CommandResult::Failure(CommandFailure {
        code: String::from("CADDY_ERROR"),
        message: String::from("engine is not running"),
    });

    assert_eq!(
        render_result("status", &success),
        r#"status: {"status":"running"}"#
    );
    assert_eq!(
        render_result("reload", &failure),
        "reload failed [CADDY_ERROR]: engine is not running"
    );
    assert_eq!(
        render_result("bogus", &CommandResult::NotImplemented),
        "bogus: not implemented"
    );
}
