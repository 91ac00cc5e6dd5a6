use std::env;
use std::fs;
use std::path::Path;

use intake_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct ConfigRow {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for row in rows(&config) {
        let source = field_source(
            row.key,
            row.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(row.key, &row.value, source));
    }

    lines.join("\n")
}

fn rows(config: &AppConfig) -> Vec<ConfigRow> {
    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|secret| redact_secret(secret.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    vec![
        ConfigRow {
            key: "llm.provider",
            env_keys: &["INTAKE_LLM_PROVIDER"],
            value: format!("{:?}", config.llm.provider),
        },
        ConfigRow { key: "llm.api_key", env_keys: &["INTAKE_LLM_API_KEY", "OPENAI_API_KEY"], value: api_key },
        ConfigRow {
            key: "llm.base_url",
            env_keys: &["INTAKE_LLM_BASE_URL"],
            value: config.llm.effective_base_url().to_string(),
        },
        ConfigRow { key: "llm.model", env_keys: &["INTAKE_LLM_MODEL"], value: config.llm.model.clone() },
        ConfigRow {
            key: "llm.timeout_secs",
            env_keys: &["INTAKE_LLM_TIMEOUT_SECS"],
            value: config.llm.timeout_secs.to_string(),
        },
        ConfigRow {
            key: "llm.temperature",
            env_keys: &["INTAKE_LLM_TEMPERATURE"],
            value: config.llm.temperature.to_string(),
        },
        ConfigRow {
            key: "llm.max_tokens",
            env_keys: &["INTAKE_LLM_MAX_TOKENS"],
            value: config.llm.max_tokens.to_string(),
        },
        ConfigRow {
            key: "llm.history_window",
            env_keys: &["INTAKE_LLM_HISTORY_WINDOW"],
            value: config.llm.history_window.to_string(),
        },
        ConfigRow {
            key: "intake.validation_min_fields",
            env_keys: &["INTAKE_VALIDATION_MIN_FIELDS"],
            value: config.intake.validation_min_fields.to_string(),
        },
        ConfigRow {
            key: "voice.server_url",
            env_keys: &["INTAKE_VOICE_SERVER_URL"],
            value: config.voice.server_url.clone(),
        },
        ConfigRow {
            key: "server.bind_address",
            env_keys: &["INTAKE_SERVER_BIND_ADDRESS"],
            value: config.server.bind_address.clone(),
        },
        ConfigRow {
            key: "server.port",
            env_keys: &["INTAKE_SERVER_PORT", "PORT"],
            value: config.server.port.to_string(),
        },
        ConfigRow {
            key: "server.graceful_shutdown_secs",
            env_keys: &["INTAKE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            value: config.server.graceful_shutdown_secs.to_string(),
        },
        ConfigRow {
            key: "logging.level",
            env_keys: &["INTAKE_LOGGING_LEVEL", "INTAKE_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        ConfigRow {
            key: "logging.format",
            env_keys: &["INTAKE_LOGGING_FORMAT", "INTAKE_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format),
        },
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a recognizable key prefix such as `sk-` and hides the rest.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
