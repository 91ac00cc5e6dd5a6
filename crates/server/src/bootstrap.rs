use std::sync::Arc;

use intake_agent::{
    InMemorySessionStore, IntakeRuntime, OpenAiCompatibleClient, RuntimeSettings, UsageTrackingLlm,
};
use intake_core::config::{AppConfig, ConfigError, LoadOptions};
use intake_core::usage::UsageTracker;
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub runtime: Arc<IntakeRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("llm client initialization failed: {0}")]
    LlmClient(String),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let tracker = Arc::new(UsageTracker::new());
    let client = OpenAiCompatibleClient::from_config(&config.llm)
        .map_err(|error| BootstrapError::LlmClient(error.to_string()))?;
    let llm = UsageTrackingLlm::new(client, Arc::clone(&tracker));

    info!(
        event_name = "system.bootstrap.llm_configured",
        correlation_id = "bootstrap",
        provider = ?config.llm.provider,
        model = %config.llm.model,
        base_url = %config.llm.effective_base_url(),
        "llm client configured"
    );

    let runtime = IntakeRuntime::new(
        Arc::new(InMemorySessionStore::new()),
        Arc::new(llm),
        tracker,
        RuntimeSettings::from_config(&config),
    );

    Ok(Application { config, runtime: Arc::new(runtime) })
}

#[cfg(test)]
mod tests {
    use intake_core::config::{ConfigOverrides, LlmProvider, LoadOptions};

    use crate::bootstrap::bootstrap;

    #[tokio::test]
    async fn bootstrap_fails_fast_on_invalid_configuration() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                llm_api_key: Some("sk-test".to_string()),
                validation_min_fields: Some(0),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("intake.validation_min_fields"));
    }

    #[tokio::test]
    async fn bootstrap_wires_runtime_from_config() {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                llm_provider: Some(LlmProvider::Ollama),
                llm_model: Some("llama3".to_string()),
                validation_min_fields: Some(5),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap should succeed for ollama without api key");

        assert_eq!(app.config.llm.model, "llama3");
        assert_eq!(app.runtime.settings().adapter.validation_min_fields, 5);
        let greeting = app.runtime.initial_greeting("boot-1").await.expect("greeting");
        assert_eq!(greeting.state.conversation_history.len(), 1);
    }
}
