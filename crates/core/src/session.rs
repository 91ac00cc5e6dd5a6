//! Per-session intake state and the operations that drive it.
//!
//! [`IntakeSession`] owns one [`IntakeState`] and is the only thing that
//! mutates it. Stage changes go through the flow engine; a rejected
//! transition is logged and leaves the state as it was. No operation here
//! fails on missing or malformed data.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::audit::{AuditContext, AuditSink, TracingAuditSink};
use crate::domain::conversation::{ConversationTurn, TurnRole};
use crate::domain::record::ClientRecord;
use crate::extract::{extract, ExtractionContext};
use crate::flows::{FlowAction, FlowContext, FlowEngine, IntakeEvent, IntakeFlow, IntakeStage};
use crate::prompts::{self, CONTINUE_GATHERING, INITIAL_GREETING};
use crate::summary::summarize;
use crate::validation::{generate_clarification_questions, validate_all, ValidationReport};

const CONFIRMATION_KEYWORDS: &[&str] = &["yes", "correct", "that's right", "looks good"];

const CONTACT_GROUP: &[&str] = &["full_name", "email", "phone"];
const GOALS_GROUP: &[&str] = &["transaction_type", "timeline", "budget"];
const CRITERIA_GROUP: &[&str] = &["location", "bedrooms", "property_type"];

/// Transferable intake state. Serializes to exactly five keys.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeState {
    pub client_data: ClientRecord,
    pub intake_complete: bool,
    pub validation_in_progress: bool,
    pub conversation_history: Vec<ConversationTurn>,
    pub current_stage: IntakeStage,
}

impl IntakeState {
    pub fn to_value(&self) -> Value {
        let history = self
            .conversation_history
            .iter()
            .map(|turn| json!({"role": turn.role.as_str(), "content": turn.content}))
            .collect::<Vec<_>>();

        json!({
            "client_data": self.client_data.to_json(),
            "intake_complete": self.intake_complete,
            "validation_in_progress": self.validation_in_progress,
            "conversation_history": history,
            "current_stage": self.current_stage.as_str(),
        })
    }

    /// Lenient import. Missing or mistyped keys fall back to an empty record,
    /// `false`, an empty history and the greeting stage. History entries
    /// without a known role or a string content are dropped.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        let flag = |key: &str| object.get(key).and_then(Value::as_bool).unwrap_or(false);

        let conversation_history = object
            .get("conversation_history")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().filter_map(parse_turn).collect())
            .unwrap_or_default();

        let current_stage = object
            .get("current_stage")
            .and_then(Value::as_str)
            .and_then(IntakeStage::parse)
            .unwrap_or_default();

        Self {
            client_data: object
                .get("client_data")
                .map(ClientRecord::from_json_lenient)
                .unwrap_or_default(),
            intake_complete: flag("intake_complete"),
            validation_in_progress: flag("validation_in_progress"),
            conversation_history,
            current_stage,
        }
    }
}

fn parse_turn(entry: &Value) -> Option<ConversationTurn> {
    let role = entry.get("role").and_then(Value::as_str).and_then(TurnRole::parse)?;
    let content = entry.get("content").and_then(Value::as_str)?;
    Some(ConversationTurn { role, content: content.to_owned() })
}

/// What a user turn produced while a summary was awaiting confirmation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The turn was recorded; the caller decides how to answer.
    Recorded,
    Completed { closing_message: String },
    ResumeGathering { message: String },
}

impl TurnOutcome {
    pub fn reply(&self) -> Option<&str> {
        match self {
            Self::Recorded => None,
            Self::Completed { closing_message } => Some(closing_message),
            Self::ResumeGathering { message } => Some(message),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationOutcome {
    NeedsClarification { report: ValidationReport, questions: Vec<String> },
    ReadyForConfirmation { summary: String },
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::ReadyForConfirmation { .. })
    }

    /// Text sent back to the client for this outcome.
    pub fn prompt(&self) -> String {
        match self {
            Self::NeedsClarification { questions, .. } => prompts::clarification_prompt(questions),
            Self::ReadyForConfirmation { summary } => prompts::validation_prompt(summary),
        }
    }
}

pub struct IntakeSession {
    session_id: Option<String>,
    correlation_id: String,
    state: IntakeState,
    engine: FlowEngine<IntakeFlow>,
    audit_sink: Arc<dyn AuditSink>,
}

impl Default for IntakeSession {
    fn default() -> Self {
        Self::from_state(IntakeState::default())
    }
}

impl IntakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: IntakeState) -> Self {
        Self {
            session_id: None,
            correlation_id: Uuid::new_v4().to_string(),
            state,
            engine: FlowEngine::default(),
            audit_sink: Arc::new(TracingAuditSink),
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = sink;
        self
    }

    pub fn set_correlation_id(&mut self, correlation_id: impl Into<String>) {
        self.correlation_id = correlation_id.into();
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn state(&self) -> &IntakeState {
        &self.state
    }

    pub fn client_data(&self) -> &ClientRecord {
        &self.state.client_data
    }

    pub fn stage(&self) -> IntakeStage {
        self.state.current_stage
    }

    pub fn is_complete(&self) -> bool {
        self.state.intake_complete
    }

    pub fn validation_in_progress(&self) -> bool {
        self.state.validation_in_progress
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.state.conversation_history
    }

    /// Seeds an empty history with the initial greeting.
    pub fn greet_if_new(&mut self) {
        if self.state.conversation_history.is_empty() {
            self.record_assistant_turn(INITIAL_GREETING);
        }
    }

    pub fn update_client_data(&mut self, context: &ExtractionContext) {
        let before = self.state.client_data.len();
        extract(&mut self.state.client_data, context);
        tracing::debug!(
            event_name = "intake.client_data_updated",
            session_id = self.session_id.as_deref().unwrap_or(""),
            fields_before = before,
            fields_after = self.state.client_data.len(),
            "extracted client data"
        );
    }

    pub fn record_user_turn(&mut self, text: &str) -> TurnOutcome {
        self.state.conversation_history.push(ConversationTurn::user(text));

        match self.state.current_stage {
            IntakeStage::Greeting => {
                self.advance(IntakeEvent::UserEngaged);
            }
            IntakeStage::Clarification if !self.state.validation_in_progress => {
                self.advance(IntakeEvent::ClarificationAnswered);
            }
            _ => {}
        }

        if !self.state.validation_in_progress {
            return TurnOutcome::Recorded;
        }

        let event = if is_confirmation(text) {
            IntakeEvent::Confirmed
        } else {
            IntakeEvent::ConfirmationRejected
        };
        let actions = self.advance(event);

        if actions.contains(&FlowAction::SendClosingMessage) {
            self.state.intake_complete = true;
            self.state.validation_in_progress = false;
            let transaction_type = self.state.client_data.text("transaction_type");
            TurnOutcome::Completed {
                closing_message: prompts::closing_message(transaction_type.as_deref()),
            }
        } else if actions.contains(&FlowAction::ResumeGathering) {
            self.state.validation_in_progress = false;
            TurnOutcome::ResumeGathering { message: CONTINUE_GATHERING.to_owned() }
        } else {
            TurnOutcome::Recorded
        }
    }

    pub fn record_assistant_turn(&mut self, text: &str) {
        self.state.conversation_history.push(ConversationTurn::assistant(text));
    }

    /// Validates the current record. Extraction is the caller's job.
    pub fn trigger_validation(&mut self) -> ValidationOutcome {
        let report = validate_all(&self.state.client_data);

        if report.is_valid() {
            let summary = summarize(&self.state.client_data);
            if self.advance(IntakeEvent::ValidationPassed).contains(&FlowAction::PresentSummary) {
                self.state.validation_in_progress = true;
            }
            ValidationOutcome::ReadyForConfirmation { summary }
        } else {
            let questions = generate_clarification_questions(&report);
            if self
                .advance(IntakeEvent::ValidationFailed)
                .contains(&FlowAction::AskClarificationQuestions)
            {
                self.state.validation_in_progress = false;
            }
            ValidationOutcome::NeedsClarification { report, questions }
        }
    }

    pub fn ready_for_validation(&self, min_fields: usize) -> bool {
        self.state.client_data.len() >= min_fields
            && !self.state.validation_in_progress
            && !self.state.intake_complete
    }

    pub fn export(&self) -> IntakeState {
        self.state.clone()
    }

    pub fn import(&mut self, state: IntakeState) {
        self.state = state;
        tracing::info!(
            event_name = "intake.state_imported",
            session_id = self.session_id.as_deref().unwrap_or(""),
            fields = self.state.client_data.len(),
            stage = %self.state.current_stage,
            "imported intake state"
        );
    }

    /// Message used when a session resumes in another mode.
    pub fn transition_message(&self) -> String {
        let record = &self.state.client_data;
        if record.is_empty() {
            return "I'm here to help with your real estate needs. Let's get started!".to_owned();
        }

        let intro = match record.text("full_name") {
            Some(name) => format!("Thanks {name}! "),
            None => "Thanks for the information so far! ".to_owned(),
        };

        let body = if self.state.current_stage == IntakeStage::Greeting {
            "Let's start gathering your real estate needs."
        } else if self.state.validation_in_progress {
            "I was just reviewing the information you've provided. Let's continue with that."
        } else if self.state.intake_complete {
            "We've completed the intake process. Is there anything else you'd like to add?"
        } else {
            let groups = [CONTACT_GROUP, GOALS_GROUP, CRITERIA_GROUP]
                .iter()
                .filter(|group| group.iter().any(|name| record.has_value(name)))
                .count();
            match groups {
                0 => "Let's start gathering your real estate needs.",
                1 => {
                    "We've started gathering your information. Let's continue with more details \
                     about your real estate needs."
                }
                _ => {
                    "We've made good progress. Let's continue gathering the remaining details \
                     about your real estate needs."
                }
            }
        };

        format!("{intro}{body}")
    }

    /// Applies `event` and returns the follow-up actions. A rejected
    /// transition yields none.
    fn advance(&mut self, event: IntakeEvent) -> Vec<FlowAction> {
        let context =
            FlowContext { awaiting_confirmation: self.state.validation_in_progress };
        let audit = AuditContext::new(
            self.session_id.clone(),
            self.correlation_id.clone(),
            "intake-session",
        );

        match self.engine.apply_with_audit(
            self.state.current_stage,
            event,
            &context,
            self.audit_sink.as_ref(),
            &audit,
        ) {
            Ok(outcome) => {
                self.state.current_stage = outcome.to;
                outcome.actions
            }
            Err(error) => {
                tracing::warn!(
                    event_name = "intake.transition_rejected",
                    correlation_id = %self.correlation_id,
                    session_id = self.session_id.as_deref().unwrap_or(""),
                    error = %error,
                    "rejected intake transition"
                );
                Vec::new()
            }
        }
    }
}

fn is_confirmation(text: &str) -> bool {
    let lowered = text.to_lowercase();
    CONFIRMATION_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}
