use std::sync::Arc;
use std::time::Instant;

use intake_agent::{
    InMemorySessionStore, IntakeRuntime, ModeSwitch, RuntimeSettings, ScriptedLlm,
};
use intake_core::config::{AppConfig, LoadOptions};
use intake_core::flows::IntakeStage;
use intake_core::usage::UsageTracker;
use serde::Serialize;
use serde_json::{json, Value};

use crate::commands::CommandResult;

const SMOKE_SESSION: &str = "smoke-session";

/// Scripted intake run, in order. A failed step skips the rest.
const SCENARIO_CHECKS: [&str; 5] =
    ["session_greeting", "voice_gathering", "text_confirmation", "mode_switch", "usage_accounting"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

pub fn run() -> CommandResult {
    let started = Instant::now();
    let mut checks = Vec::new();

    let config = match timed_check(|| AppConfig::load(LoadOptions::default())) {
        Ok((elapsed_ms, config)) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Pass,
                elapsed_ms,
                message: "configuration loaded and validated".to_string(),
            });
            config
        }
        Err((elapsed_ms, error)) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Fail,
                elapsed_ms,
                message: error.to_string(),
            });
            checks.extend(SCENARIO_CHECKS.into_iter().map(skipped));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(SmokeCheck {
                name: SCENARIO_CHECKS[0],
                status: SmokeStatus::Fail,
                elapsed_ms: 0,
                message: format!("failed to initialize async runtime: {error}"),
            });
            checks.extend(SCENARIO_CHECKS[1..].iter().copied().map(skipped));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    let intake = IntakeRuntime::new(
        Arc::new(InMemorySessionStore::new()),
        Arc::new(ScriptedLlm::new(config.llm.model.clone())),
        Arc::new(UsageTracker::new()),
        RuntimeSettings::from_config(&config),
    );

    for (index, name) in SCENARIO_CHECKS.into_iter().enumerate() {
        let outcome = timed_check(|| runtime.block_on(run_step(&intake, name)));
        let passed = outcome.is_ok();
        checks.push(match outcome {
            Ok((elapsed_ms, message)) => {
                SmokeCheck { name, status: SmokeStatus::Pass, elapsed_ms, message }
            }
            Err((elapsed_ms, message)) => {
                SmokeCheck { name, status: SmokeStatus::Fail, elapsed_ms, message }
            }
        });
        if !passed {
            checks.extend(SCENARIO_CHECKS[index + 1..].iter().copied().map(skipped));
            break;
        }
    }

    finalize_report(checks, started.elapsed().as_millis() as u64)
}

async fn run_step(intake: &IntakeRuntime, name: &str) -> Result<String, String> {
    match name {
        "session_greeting" => session_greeting(intake).await,
        "voice_gathering" => voice_gathering(intake).await,
        "text_confirmation" => text_confirmation(intake).await,
        "mode_switch" => mode_switch(intake).await,
        "usage_accounting" => usage_accounting(intake),
        other => Err(format!("unknown smoke step `{other}`")),
    }
}

async fn session_greeting(intake: &IntakeRuntime) -> Result<String, String> {
    let greeting = intake.initial_greeting(SMOKE_SESSION).await.map_err(|e| e.to_string())?;
    if greeting.state.conversation_history.len() != 1 {
        return Err("new session should hold exactly the greeting".to_string());
    }
    Ok(format!("greeting stored for `{SMOKE_SESSION}`"))
}

async fn voice_gathering(intake: &IntakeRuntime) -> Result<String, String> {
    let context = buyer_context();
    let reply = intake
        .voice_transcript(
            SMOKE_SESSION,
            "I'm looking to buy a condo downtown",
            context.as_object(),
            Some(6.0),
        )
        .await
        .map_err(|e| e.to_string())?;

    if reply.state.current_stage != IntakeStage::Confirmation {
        return Err(format!(
            "expected confirmation stage after a complete record, got `{}`",
            reply.state.current_stage
        ));
    }
    Ok(format!("{} fields collected, summary presented", reply.client_data.len()))
}

async fn text_confirmation(intake: &IntakeRuntime) -> Result<String, String> {
    let reply = intake
        .text_message(SMOKE_SESSION, "Yes, that's correct", None)
        .await
        .map_err(|e| e.to_string())?;

    if !reply.state.intake_complete {
        return Err("confirmation did not complete the intake".to_string());
    }
    Ok(format!("intake completed in stage `{}`", reply.state.current_stage))
}

async fn mode_switch(intake: &IntakeRuntime) -> Result<String, String> {
    let to_voice = intake
        .switch_mode(SMOKE_SESSION, "text", "voice", None)
        .await
        .map_err(|e| e.to_string())?;
    let ModeSwitch::Voice { connection_details } = to_voice else {
        return Err("text -> voice did not return connection details".to_string());
    };

    let state = serde_json::to_value(&connection_details.state).map_err(|e| e.to_string())?;
    let to_text = intake
        .switch_mode(SMOKE_SESSION, "voice", "text", Some(&state))
        .await
        .map_err(|e| e.to_string())?;
    let ModeSwitch::Text { state: returned, .. } = to_text else {
        return Err("voice -> text did not return a transition message".to_string());
    };

    if returned != connection_details.state {
        return Err("state changed across the mode round trip".to_string());
    }
    Ok(format!("round trip through `{}` preserved state", connection_details.url))
}

fn usage_accounting(intake: &IntakeRuntime) -> Result<String, String> {
    let summary = intake.cost_summary(SMOKE_SESSION);
    if summary.total_cost == "$0.0000" {
        return Err("voice turn produced no metered cost".to_string());
    }
    Ok(format!(
        "{} for {} audio and {} characters",
        summary.total_cost, summary.audio_seconds, summary.characters
    ))
}

fn buyer_context() -> Value {
    json!({
        "full_name": "Smoke Test",
        "email": "smoke@example.com",
        "phone": "+15550001111",
        "preferred_contact": "email",
        "transaction_type": "buy",
        "timeline": "within 3 months",
        "budget": "$500k",
        "location": "Downtown",
        "bedrooms": 2,
        "property_type": "condo",
        "pre_approval": true,
        "payment_method": "mortgage",
    })
}

fn timed_check<T, E>(check: impl FnOnce() -> Result<T, E>) -> Result<(u64, T), (u64, E)> {
    let started = Instant::now();
    match check() {
        Ok(value) => Ok((started.elapsed().as_millis() as u64, value)),
        Err(error) => Err((started.elapsed().as_millis() as u64, error)),
    }
}

fn skipped(name: &'static str) -> SmokeCheck {
    SmokeCheck {
        name,
        status: SmokeStatus::Skipped,
        elapsed_ms: 0,
        message: "skipped due previous failure".to_string(),
    }
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let passed = checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
    let total = checks.len();
    let failed = checks.iter().any(|check| check.status == SmokeStatus::Fail);

    let report = SmokeReport {
        command: "smoke",
        status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
        summary: format!("smoke: {passed}/{total} checks passed in {total_elapsed_ms}ms"),
        total_elapsed_ms,
        checks,
    };

    CommandResult::report("smoke", if failed { 6 } else { 0 }, &report.summary, &report)
}
