use std::fs;
use std::path::Path;

use intake_core::domain::record::ClientRecord;
use intake_core::prompts::clarification_prompt;
use intake_core::summary::summarize;
use intake_core::validation::{generate_clarification_questions, validate_all};
use serde_json::Value;

use crate::commands::CommandResult;

/// Validates a JSON client record. A complete record prints its summary, an
/// incomplete one the questions an agent would ask next.
pub fn run(path: &Path) -> CommandResult {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            return CommandResult::failure(
                "validate",
                "io",
                format!("could not read `{}`: {error}", path.display()),
                2,
            );
        }
    };

    let value = match serde_json::from_str::<Value>(&raw) {
        Ok(value) if value.is_object() => value,
        Ok(_) => {
            return CommandResult::failure(
                "validate",
                "parse",
                format!("`{}` must contain a JSON object", path.display()),
                2,
            );
        }
        Err(error) => {
            return CommandResult::failure(
                "validate",
                "parse",
                format!("could not parse `{}`: {error}", path.display()),
                2,
            );
        }
    };

    let record = ClientRecord::from_json_lenient(&value);
    let report = validate_all(&record);
    if report.is_valid() {
        return CommandResult::success("validate", summarize(&record));
    }

    let questions = generate_clarification_questions(&report);
    CommandResult::failure("validate", "incomplete_record", clarification_prompt(&questions), 3)
}
