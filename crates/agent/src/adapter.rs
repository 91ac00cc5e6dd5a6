use intake_core::config::AppConfig;
use intake_core::domain::record::ClientRecord;
use intake_core::session::{IntakeSession, IntakeState};
use serde::Serialize;

/// Answer for one client turn, in the shape the HTTP API returns it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AdapterReply {
    pub response: String,
    pub client_data: ClientRecord,
    pub state: IntakeState,
}

impl AdapterReply {
    pub(crate) fn from_session(response: String, session: &IntakeSession) -> Self {
        Self { response, client_data: session.client_data().clone(), state: session.export() }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AdapterSettings {
    pub validation_min_fields: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    pub history_window: usize,
    pub stt_model: String,
    pub tts_model: String,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            validation_min_fields: 3,
            temperature: 0.7,
            max_tokens: 500,
            history_window: 10,
            stt_model: "nova-2".to_string(),
            tts_model: "cartesia".to_string(),
        }
    }
}

impl AdapterSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            validation_min_fields: config.intake.validation_min_fields,
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            history_window: config.llm.history_window,
            ..Self::default()
        }
    }
}
