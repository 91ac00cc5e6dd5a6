use std::sync::Arc;

use intake_core::extract::ExtractionContext;
use intake_core::schema::next_missing_field;
use intake_core::session::IntakeSession;
use intake_core::usage::{UsageMetadata, UsageTracker};
use serde_json::Value;

use crate::adapter::{AdapterReply, AdapterSettings};

/// Voice front-end. Answers are scripted from the field schema so that
/// spoken turns stay short; speech usage is metered per turn.
pub struct VoiceModeAdapter {
    session: IntakeSession,
    tracker: Arc<UsageTracker>,
    settings: AdapterSettings,
}

impl VoiceModeAdapter {
    pub fn new(mut session: IntakeSession, tracker: Arc<UsageTracker>, settings: AdapterSettings) -> Self {
        session.greet_if_new();
        Self { session, tracker, settings }
    }

    pub fn session(&self) -> &IntakeSession {
        &self.session
    }

    pub fn into_session(self) -> IntakeSession {
        self.session
    }

    /// Handles one recognized utterance. `context` carries structured values
    /// the voice pipeline picked up alongside the transcript.
    pub fn handle_transcript(
        &mut self,
        transcript: &str,
        context: Option<&ExtractionContext>,
        audio_seconds: f64,
    ) -> AdapterReply {
        let session_id = self.session.session_id().map(str::to_string);
        self.tracker.track_stt(
            session_id.as_deref(),
            &self.settings.stt_model,
            audio_seconds,
            UsageMetadata::new(),
        );

        let mut merged = context.cloned().unwrap_or_default();
        merged.insert("message".to_string(), Value::String(transcript.to_string()));
        self.session.update_client_data(&merged);

        let outcome = self.session.record_user_turn(transcript);
        let response = match outcome.reply() {
            Some(reply) => reply.to_string(),
            None => self.next_prompt(),
        };

        let mut metadata = UsageMetadata::new();
        metadata.insert("stage".to_string(), self.session.stage().to_string());
        self.tracker.track_tts(
            session_id.as_deref(),
            &self.settings.tts_model,
            response.chars().count() as u64,
            metadata,
        );

        self.session.record_assistant_turn(&response);
        AdapterReply::from_session(response, &self.session)
    }

    fn next_prompt(&mut self) -> String {
        if self.session.ready_for_validation(self.settings.validation_min_fields) {
            return self.session.trigger_validation().prompt();
        }
        match next_missing_field(self.session.client_data()) {
            Some(field) => field.prompt.to_string(),
            None => self.session.transition_message(),
        }
    }
}
