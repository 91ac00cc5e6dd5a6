use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex};

use intake_core::audit::{
    AuditCategory, AuditEvent, AuditOutcome, AuditSink, TracingAuditSink,
};
use intake_core::config::AppConfig;
use intake_core::errors::{ApplicationError, DomainError};
use intake_core::extract::ExtractionContext;
use intake_core::prompts::INITIAL_GREETING;
use intake_core::session::{IntakeSession, IntakeState};
use intake_core::usage::{CostSummary, UsageTracker};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::adapter::{AdapterReply, AdapterSettings};
use crate::llm::LlmClient;
use crate::store::SessionStore;
use crate::text::TextModeAdapter;
use crate::voice::VoiceModeAdapter;

#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeSettings {
    pub adapter: AdapterSettings,
    pub voice_server_url: String,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            adapter: AdapterSettings::default(),
            voice_server_url: "ws://localhost:7880".to_string(),
        }
    }
}

impl RuntimeSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            adapter: AdapterSettings::from_config(config),
            voice_server_url: config.voice.server_url.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntakeMode {
    Text,
    Voice,
}

impl IntakeMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "voice" => Some(Self::Voice),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Voice => "voice",
        }
    }
}

impl fmt::Display for IntakeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Greeting {
    pub greeting: String,
    pub state: IntakeState,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConnectionDetails {
    pub url: String,
    pub state: IntakeState,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ModeSwitch {
    Voice { connection_details: ConnectionDetails },
    Text { message: String, state: IntakeState },
}

/// Drives sessions through the mode adapters. Turns for one session are
/// serialized; different sessions run in parallel.
pub struct IntakeRuntime {
    store: Arc<dyn SessionStore>,
    llm: Arc<dyn LlmClient>,
    tracker: Arc<UsageTracker>,
    settings: RuntimeSettings,
    audit_sink: Arc<dyn AuditSink>,
    session_locks: SessionLocks,
}

type SessionLocks = StdMutex<HashMap<String, Arc<Mutex<()>>>>;

/// Exclusive hold on one session for the length of a turn. On drop the
/// session's lock is forgotten unless another turn is already waiting on it.
struct SessionTurn<'a> {
    locks: &'a SessionLocks,
    session_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionTurn<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        if locks.get(&self.session_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&self.session_id);
        }
    }
}

impl IntakeRuntime {
    pub fn new(
        store: Arc<dyn SessionStore>,
        llm: Arc<dyn LlmClient>,
        tracker: Arc<UsageTracker>,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            store,
            llm,
            tracker,
            settings,
            audit_sink: Arc::new(TracingAuditSink),
            session_locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = sink;
        self
    }

    pub fn tracker(&self) -> &Arc<UsageTracker> {
        &self.tracker
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub async fn initial_greeting(&self, session_id: &str) -> Result<Greeting, ApplicationError> {
        let _turn = self.begin_turn(session_id).await?;

        let mut session = self.open_session(session_id, None).await?;
        session.greet_if_new();
        let state = session.export();
        self.store.save(session_id, state.clone()).await?;

        Ok(Greeting { greeting: INITIAL_GREETING.to_string(), state })
    }

    pub async fn text_message(
        &self,
        session_id: &str,
        message: &str,
        agent_state: Option<&Value>,
    ) -> Result<AdapterReply, ApplicationError> {
        let _turn = self.begin_turn(session_id).await?;

        let session = self.open_session(session_id, agent_state).await?;
        let mut adapter =
            TextModeAdapter::new(session, Arc::clone(&self.llm), self.settings.adapter.clone());
        let reply = adapter.process_message(message).await;
        self.store.save(session_id, reply.state.clone()).await?;

        tracing::info!(
            event_name = "intake.text_message_processed",
            session_id,
            stage = %reply.state.current_stage,
            fields = reply.client_data.len(),
            "processed text message"
        );
        Ok(reply)
    }

    pub async fn voice_transcript(
        &self,
        session_id: &str,
        transcript: &str,
        context: Option<&ExtractionContext>,
        audio_seconds: Option<f64>,
    ) -> Result<AdapterReply, ApplicationError> {
        let _turn = self.begin_turn(session_id).await?;

        let session = self.open_session(session_id, None).await?;
        let mut adapter = VoiceModeAdapter::new(
            session,
            Arc::clone(&self.tracker),
            self.settings.adapter.clone(),
        );
        let reply = adapter.handle_transcript(transcript, context, audio_seconds.unwrap_or(0.0));
        self.store.save(session_id, reply.state.clone()).await?;

        tracing::info!(
            event_name = "intake.voice_transcript_processed",
            session_id,
            stage = %reply.state.current_stage,
            fields = reply.client_data.len(),
            "processed voice transcript"
        );
        Ok(reply)
    }

    /// Moves a session between modes. The session must either exist or be
    /// handed over through `agent_state`.
    pub async fn switch_mode(
        &self,
        session_id: &str,
        current_mode: &str,
        new_mode: &str,
        agent_state: Option<&Value>,
    ) -> Result<ModeSwitch, ApplicationError> {
        let unsupported = || ApplicationError::UnsupportedModeSwitch {
            from: current_mode.to_string(),
            to: new_mode.to_string(),
        };
        let from = IntakeMode::parse(current_mode).ok_or_else(unsupported)?;
        let to = IntakeMode::parse(new_mode).ok_or_else(unsupported)?;
        if from == to {
            return Err(unsupported());
        }

        let _turn = self.begin_turn(session_id).await?;

        if agent_state.is_none() && self.store.load(session_id).await?.is_none() {
            return Err(ApplicationError::SessionNotFound(session_id.to_string()));
        }

        let session = self.open_session(session_id, agent_state).await?;
        let state = session.export();
        self.store.save(session_id, state.clone()).await?;

        tracing::info!(
            event_name = "intake.mode_switched",
            session_id,
            from = %from,
            to = %to,
            "switched intake mode"
        );

        Ok(match to {
            IntakeMode::Voice => ModeSwitch::Voice {
                connection_details: ConnectionDetails {
                    url: self.settings.voice_server_url.clone(),
                    state,
                },
            },
            IntakeMode::Text => ModeSwitch::Text { message: session.transition_message(), state },
        })
    }

    pub fn cost_summary(&self, session_id: &str) -> CostSummary {
        self.tracker.summary(Some(session_id)).cost_summary()
    }

    /// Drops the stored session once any turn in flight for it has finished.
    pub async fn end_session(&self, session_id: &str) -> Result<Option<IntakeState>, ApplicationError> {
        let _turn = self.begin_turn(session_id).await?;
        let removed = self.store.remove(session_id).await?;

        if removed.is_some() {
            self.audit_sink.emit(AuditEvent::new(
                Some(session_id.to_string()),
                Uuid::new_v4().to_string(),
                "intake.session_ended",
                AuditCategory::System,
                "intake-runtime",
                AuditOutcome::Success,
            ));
        }
        tracing::info!(
            event_name = "intake.session_ended",
            session_id,
            removed = removed.is_some(),
            "ended intake session"
        );
        Ok(removed)
    }

    async fn open_session(
        &self,
        session_id: &str,
        agent_state: Option<&Value>,
    ) -> Result<IntakeSession, ApplicationError> {
        let stored = self.store.load(session_id).await?.unwrap_or_default();
        let mut session = IntakeSession::from_state(stored)
            .with_session_id(session_id)
            .with_audit_sink(Arc::clone(&self.audit_sink));
        if let Some(value) = agent_state {
            session.import(IntakeState::from_value(value));
        }
        Ok(session)
    }

    async fn begin_turn(&self, session_id: &str) -> Result<SessionTurn<'_>, ApplicationError> {
        if session_id.trim().is_empty() {
            return Err(DomainError::InvariantViolation("session id must not be empty".to_string())
                .into());
        }
        let lock = {
            let mut locks = match self.session_locks.lock() {
                Ok(locks) => locks,
                Err(poisoned) => poisoned.into_inner(),
            };
            Arc::clone(locks.entry(session_id.to_string()).or_default())
        };
        let guard = lock.lock_owned().await;

        Ok(SessionTurn {
            locks: &self.session_locks,
            session_id: session_id.to_string(),
            guard: Some(guard),
        })
    }

    #[cfg(test)]
    fn tracked_sessions(&self) -> usize {
        match self.session_locks.lock() {
            Ok(locks) => locks.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}
