use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use intake_core::config::LlmConfig;
use intake_core::domain::conversation::{ConversationTurn, TurnRole};
use intake_core::usage::{UsageMetadata, UsageTracker};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

impl From<&ConversationTurn> for ChatMessage {
    fn from(turn: &ConversationTurn) -> Self {
        match turn.role {
            TurnRole::User => Self::user(turn.content.clone()),
            TurnRole::Assistant => Self::assistant(turn.content.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    /// Used for usage attribution only; never sent to the provider.
    pub session_id: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: content.into(), usage: None }
    }
}

/// Chat-completion backend. The intake flow only uses it to phrase replies;
/// extraction and validation never depend on its output.
#[async_trait]
pub trait LlmClient: Send + Sync {
    fn model(&self) -> &str;
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}

/// Client for any endpoint speaking the OpenAI chat-completions protocol
/// (OpenAI itself, Ollama's `/v1` surface).
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
}

impl OpenAiCompatibleClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build llm http client")?;

        Ok(Self {
            http,
            base_url: config.effective_base_url().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request_body(&self, request: &CompletionRequest) -> ChatCompletionBody {
        ChatCompletionBody {
            model: self.model.clone(),
            messages: request.messages.clone(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let mut builder = self.http.post(self.completions_url()).json(&self.request_body(request));
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("chat completion request to {} failed", self.base_url))?
            .error_for_status()
            .context("chat completion endpoint returned an error status")?;

        let body: ChatCompletionResponse =
            response.json().await.context("chat completion response was not valid json")?;
        parse_completion(body)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn parse_completion(body: ChatCompletionResponse) -> Result<Completion> {
    let content = body
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("chat completion response contained no message content"))?;

    Ok(Completion { content, usage: body.usage })
}

/// Records every successful completion in a [`UsageTracker`]. Token counts
/// come from the provider when reported, otherwise from a four characters
/// per token estimate.
pub struct UsageTrackingLlm<C> {
    inner: C,
    tracker: Arc<UsageTracker>,
}

impl<C> UsageTrackingLlm<C>
where
    C: LlmClient,
{
    pub fn new(inner: C, tracker: Arc<UsageTracker>) -> Self {
        Self { inner, tracker }
    }

    pub fn tracker(&self) -> &Arc<UsageTracker> {
        &self.tracker
    }
}

#[async_trait]
impl<C> LlmClient for UsageTrackingLlm<C>
where
    C: LlmClient,
{
    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let started = Instant::now();
        let completion = self.inner.complete(request).await?;

        let (input_tokens, output_tokens) = match completion.usage {
            Some(usage) => (usage.prompt_tokens, usage.completion_tokens),
            None => {
                let prompt_chars =
                    request.messages.iter().map(|message| message.content.len()).sum::<usize>();
                (estimate_tokens(prompt_chars), estimate_tokens(completion.content.len()))
            }
        };

        let mut metadata = UsageMetadata::new();
        metadata.insert("duration_ms".to_string(), started.elapsed().as_millis().to_string());
        metadata.insert("estimated".to_string(), completion.usage.is_none().to_string());
        self.tracker.track_llm(
            request.session_id.as_deref(),
            self.inner.model(),
            input_tokens,
            output_tokens,
            metadata,
        );

        Ok(completion)
    }
}

fn estimate_tokens(chars: usize) -> u64 {
    (chars / 4) as u64
}

/// Offline client that replays queued replies, then falls back to a fixed
/// reply. Every request is kept for inspection.
#[derive(Clone, Default)]
pub struct ScriptedLlm {
    model: String,
    replies: Arc<Mutex<VecDeque<Result<Completion, String>>>>,
    fallback: String,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedLlm {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            fallback: "Thanks! Could you tell me a bit more?".to_string(),
            ..Self::default()
        }
    }

    pub fn with_fallback(mut self, reply: impl Into<String>) -> Self {
        self.fallback = reply.into();
        self
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.push(Ok(Completion::text(reply)));
    }

    pub fn push_failure(&self, message: impl Into<String>) {
        self.push(Err(message.into()));
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn push(&self, reply: Result<Completion, String>) {
        match self.replies.lock() {
            Ok(mut replies) => replies.push_back(reply),
            Err(poisoned) => poisoned.into_inner().push_back(reply),
        }
    }

    fn next_reply(&self) -> Option<Result<Completion, String>> {
        match self.replies.lock() {
            Ok(mut replies) => replies.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        match self.requests.lock() {
            Ok(mut requests) => requests.push(request.clone()),
            Err(poisoned) => poisoned.into_inner().push(request.clone()),
        }

        match self.next_reply() {
            Some(Ok(completion)) => Ok(completion),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(Completion::text(self.fallback.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use intake_core::config::{AppConfig, LlmProvider};
    use intake_core::usage::UsageTracker;
    use serde_json::json;

    use super::{
        parse_completion, ChatCompletionResponse, ChatMessage, CompletionRequest, LlmClient,
        OpenAiCompatibleClient, ScriptedLlm, UsageTrackingLlm,
    };

    fn request(session_id: &str) -> CompletionRequest {
        CompletionRequest {
            session_id: Some(session_id.to_string()),
            messages: vec![ChatMessage::system("be brief"), ChatMessage::user("hello there")],
            temperature: 0.7,
            max_tokens: 500,
        }
    }

    #[test]
    fn request_body_uses_configured_model_and_sampling() {
        let mut config = AppConfig::default().llm;
        config.provider = LlmProvider::Ollama;
        config.model = "llama3.1".to_string();
        let client = OpenAiCompatibleClient::from_config(&config).expect("client");

        let body = serde_json::to_value(client.request_body(&request("s1"))).expect("json");

        assert_eq!(client.completions_url(), "http://localhost:11434/v1/chat/completions");
        assert_eq!(body["model"], json!("llama3.1"));
        assert_eq!(body["max_tokens"], json!(500));
        assert_eq!(body["messages"][0], json!({"role": "system", "content": "be brief"}));
        assert!(body.get("session_id").is_none());
    }

    #[test]
    fn completion_parsing_reads_first_choice_and_usage() {
        let body: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "Hi!"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }))
        .expect("decode");

        let completion = parse_completion(body).expect("completion");
        assert_eq!(completion.content, "Hi!");
        assert_eq!(completion.usage.map(|usage| usage.prompt_tokens), Some(12));

        let empty: ChatCompletionResponse =
            serde_json::from_value(json!({"choices": []})).expect("decode");
        assert!(parse_completion(empty).is_err());
    }

    #[tokio::test]
    async fn usage_wrapper_estimates_tokens_when_provider_omits_usage() {
        let tracker = Arc::new(UsageTracker::new());
        let scripted = ScriptedLlm::new("gpt-4o-mini");
        scripted.push_reply("12345678");
        let llm = UsageTrackingLlm::new(scripted, Arc::clone(&tracker));

        let completion = llm.complete(&request("s1")).await.expect("completion");

        assert_eq!(completion.content, "12345678");
        let records = tracker.records();
        assert_eq!(records.len(), 1);
        // "be brief" + "hello there" = 19 chars
        assert_eq!(records[0].input_tokens, 4);
        assert_eq!(records[0].output_tokens, 2);
        assert_eq!(records[0].session_id.as_deref(), Some("s1"));
        assert_eq!(records[0].provider, "openai");
    }

    #[tokio::test]
    async fn failed_completions_are_not_tracked() {
        let tracker = Arc::new(UsageTracker::new());
        let scripted = ScriptedLlm::new("gpt-4o-mini");
        scripted.push_failure("upstream timeout");
        let llm = UsageTrackingLlm::new(scripted, Arc::clone(&tracker));

        let error = llm.complete(&request("s1")).await.expect_err("failure");

        assert!(error.to_string().contains("upstream timeout"));
        assert!(tracker.records().is_empty());
    }
}
