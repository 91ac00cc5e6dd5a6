use std::collections::BTreeSet;

use intake_core::config::{AppConfig, LlmProvider, LoadOptions};
use intake_core::schema::all_fields;
use serde::Serialize;

use crate::commands::escape_json;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = vec![check_field_schema()];

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_llm_readiness(&config));
            checks.push(check_voice_server(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["llm_readiness", "voice_server"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_field_schema() -> DoctorCheck {
    let mut seen = BTreeSet::new();
    let duplicates = all_fields()
        .filter(|(_, spec)| !seen.insert(spec.name))
        .map(|(_, spec)| spec.name)
        .collect::<Vec<_>>();

    if duplicates.is_empty() {
        DoctorCheck {
            name: "field_schema",
            status: CheckStatus::Pass,
            details: format!("{} fields with unique names", seen.len()),
        }
    } else {
        DoctorCheck {
            name: "field_schema",
            status: CheckStatus::Fail,
            details: format!("duplicate field names: {}", duplicates.join(", ")),
        }
    }
}

fn check_llm_readiness(config: &AppConfig) -> DoctorCheck {
    let credentials = match (config.llm.provider, config.llm.api_key.is_some()) {
        (LlmProvider::OpenAi, true) => "api key present",
        (LlmProvider::OpenAi, false) => {
            return DoctorCheck {
                name: "llm_readiness",
                status: CheckStatus::Fail,
                details: "openai provider selected without an api key".to_string(),
            };
        }
        (LlmProvider::Ollama, _) => "no api key required",
    };

    DoctorCheck {
        name: "llm_readiness",
        status: CheckStatus::Pass,
        details: format!(
            "{:?} model `{}` at {} ({credentials})",
            config.llm.provider,
            config.llm.model,
            config.llm.effective_base_url()
        ),
    }
}

fn check_voice_server(config: &AppConfig) -> DoctorCheck {
    DoctorCheck {
        name: "voice_server",
        status: CheckStatus::Pass,
        details: format!("voice sessions connect to `{}`", config.voice.server_url),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
