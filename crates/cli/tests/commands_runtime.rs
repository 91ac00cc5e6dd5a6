use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use intake_cli::commands::{config, doctor, smoke, validate};
use serde_json::{json, Value};

#[test]
fn smoke_returns_success_report_with_api_key() {
    with_env(&[("INTAKE_LLM_API_KEY", "sk-test")], || {
        let result = smoke::run();
        assert_eq!(result.exit_code, 0, "expected successful smoke report: {}", result.output);

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["command"], "smoke");
        assert_eq!(payload["status"], "pass");

        let checks = payload["checks"].as_array().expect("checks array");
        let names = checks.iter().filter_map(|check| check["name"].as_str()).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "config_validation",
                "session_greeting",
                "voice_gathering",
                "text_confirmation",
                "mode_switch",
                "usage_accounting",
            ]
        );
        assert!(checks.iter().all(|check| check["status"] == "pass"));
    });
}

#[test]
fn smoke_runs_offline_against_ollama_without_key() {
    with_env(&[("INTAKE_LLM_PROVIDER", "ollama")], || {
        let result = smoke::run();
        assert_eq!(result.exit_code, 0, "expected successful smoke report: {}", result.output);
    });
}

#[test]
fn smoke_returns_failure_when_config_invalid() {
    with_env(&[], || {
        let result = smoke::run();
        assert_eq!(result.exit_code, 6, "expected smoke failure code");

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["command"], "smoke");
        assert_eq!(payload["status"], "fail");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
    });
}

#[test]
fn doctor_json_reports_pass_with_valid_env() {
    with_env(&[("INTAKE_LLM_API_KEY", "sk-test")], || {
        let payload = parse_payload(&doctor::run(true));
        assert_eq!(payload["overall_status"], "pass");
        assert_eq!(payload["checks"][0]["name"], "field_schema");
        assert_eq!(payload["checks"][0]["details"], "17 fields with unique names");
    });
}

#[test]
fn doctor_skips_dependent_checks_when_config_fails() {
    with_env(&[], || {
        let output = doctor::run(false);
        assert!(output.starts_with("doctor: one or more readiness checks failed"));
        assert!(output.contains("- [fail] config_validation:"));
        assert!(output.contains("- [skip] llm_readiness:"));
    });
}

#[test]
fn config_attributes_sources_and_redacts_api_key() {
    with_env(&[("INTAKE_LLM_API_KEY", "sk-very-secret"), ("INTAKE_SERVER_PORT", "9100")], || {
        let output = config::run();
        assert!(output.starts_with("effective config (source precedence: env > file > default):"));
        assert!(output.contains("- llm.api_key = sk-*** (source: env (INTAKE_LLM_API_KEY))"));
        assert!(output.contains("- server.port = 9100 (source: env (INTAKE_SERVER_PORT))"));
        assert!(output.contains("- llm.model = gpt-4o-mini (source: default)"));
        assert!(!output.contains("very-secret"));
    });
}

#[test]
fn config_reports_fallback_api_key_variable() {
    with_env(&[("OPENAI_API_KEY", "sk-from-openai")], || {
        let output = config::run();
        assert!(output.contains("- llm.api_key = sk-*** (source: env (OPENAI_API_KEY))"));
    });
}

#[test]
fn validate_prints_summary_for_complete_record() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("client.json");
    let record = json!({
        "full_name": "Sam Seller",
        "email": "sam@example.com",
        "phone": "5551234567",
        "preferred_contact": "phone",
        "transaction_type": "sell",
        "timeline": "next month",
        "budget": "$700k",
    });
    fs::write(&path, record.to_string()).expect("write record");

    let result = validate::run(&path);
    assert_eq!(result.exit_code, 0, "{}", result.output);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["status"], "ok");
    let message = payload["message"].as_str().unwrap_or_default();
    assert!(message.starts_with("Here's a summary of the information you've provided:"));
    assert!(message.contains("Sam Seller"));
}

#[test]
fn validate_lists_questions_for_incomplete_record() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("client.json");
    fs::write(&path, r#"{"full_name": "Jo", "transaction_type": "buy"}"#).expect("write record");

    let result = validate::run(&path);
    assert_eq!(result.exit_code, 3);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["error_class"], "incomplete_record");
    let message = payload["message"].as_str().unwrap_or_default();
    assert!(message.contains("I don't think I caught your email address."));
}

#[test]
fn validate_rejects_unreadable_and_non_object_input() {
    let dir = tempfile::tempdir().expect("tempdir");

    let missing = validate::run(&dir.path().join("missing.json"));
    assert_eq!(missing.exit_code, 2);
    assert_eq!(parse_payload(&missing.output)["error_class"], "io");

    let path = dir.path().join("list.json");
    fs::write(&path, "[1, 2, 3]").expect("write");
    let not_object = validate::run(&path);
    assert_eq!(not_object.exit_code, 2);
    assert_eq!(parse_payload(&not_object.output)["error_class"], "parse");
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn last_line(output: &str) -> &str {
    output.lines().last().unwrap_or_default()
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "INTAKE_LLM_PROVIDER",
        "INTAKE_LLM_API_KEY",
        "OPENAI_API_KEY",
        "INTAKE_LLM_BASE_URL",
        "INTAKE_LLM_MODEL",
        "INTAKE_LLM_TIMEOUT_SECS",
        "INTAKE_LLM_TEMPERATURE",
        "INTAKE_LLM_MAX_TOKENS",
        "INTAKE_LLM_HISTORY_WINDOW",
        "INTAKE_VALIDATION_MIN_FIELDS",
        "INTAKE_VOICE_SERVER_URL",
        "INTAKE_SERVER_BIND_ADDRESS",
        "INTAKE_SERVER_PORT",
        "PORT",
        "INTAKE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "INTAKE_LOGGING_LEVEL",
        "INTAKE_LOGGING_FORMAT",
        "INTAKE_LOG_LEVEL",
        "INTAKE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
