use std::collections::HashMap;

use async_trait::async_trait;
use intake_core::errors::ApplicationError;
use intake_core::session::IntakeState;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        ApplicationError::Integration(value.to_string())
    }
}

/// Keyed storage for intake state between turns.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<IntakeState>, StoreError>;
    async fn save(&self, session_id: &str, state: IntakeState) -> Result<(), StoreError>;
    async fn remove(&self, session_id: &str) -> Result<Option<IntakeState>, StoreError>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, IntakeState>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<IntakeState>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned())
    }

    async fn save(&self, session_id: &str, state: IntakeState) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id.to_string(), state);
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<Option<IntakeState>, StoreError> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.remove(session_id))
    }
}
