pub mod config;
pub mod doctor;
pub mod smoke;
pub mod validate;

use serde::Serialize;

/// Exit code and printable output of one CLI command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome<'a> {
    command: &'a str,
    status: &'static str,
    error_class: Option<&'a str>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload =
            CommandOutcome { command, status: "ok", error_class: None, message: message.into() };
        Self { exit_code: 0, output: to_json_line(command, &payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command,
            status: "error",
            error_class: Some(error_class),
            message: message.into(),
        };
        Self { exit_code, output: to_json_line(command, &payload) }
    }

    /// A one-line human summary followed by the machine-readable report.
    pub fn report(command: &str, exit_code: u8, human: &str, payload: &impl Serialize) -> Self {
        Self { exit_code, output: format!("{human}\n{}", to_json_line(command, payload)) }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

fn to_json_line(command: &str, payload: &impl Serialize) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"{}\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            escape_json(command),
            escape_json(&error.to_string())
        )
    })
}

pub(crate) fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
