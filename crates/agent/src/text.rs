use std::sync::Arc;

use intake_core::extract::ExtractionContext;
use intake_core::prompts::{AGENT_INSTRUCTIONS, INITIAL_GREETING, LLM_FAILURE_REPLY};
use intake_core::session::{IntakeSession, TurnOutcome};
use serde_json::Value;

use crate::adapter::{AdapterReply, AdapterSettings};
use crate::llm::{ChatMessage, CompletionRequest, LlmClient};

/// Text front-end. Replies come from the LLM except for validation,
/// clarification and closing messages, which are scripted.
pub struct TextModeAdapter {
    session: IntakeSession,
    llm: Arc<dyn LlmClient>,
    settings: AdapterSettings,
}

impl TextModeAdapter {
    pub fn new(mut session: IntakeSession, llm: Arc<dyn LlmClient>, settings: AdapterSettings) -> Self {
        session.greet_if_new();
        Self { session, llm, settings }
    }

    pub fn session(&self) -> &IntakeSession {
        &self.session
    }

    pub fn into_session(self) -> IntakeSession {
        self.session
    }

    pub fn initial_greeting(&self) -> &'static str {
        INITIAL_GREETING
    }

    pub async fn process_message(&mut self, message: &str) -> AdapterReply {
        let mut context = ExtractionContext::new();
        context.insert("message".to_string(), Value::String(message.to_string()));
        self.session.update_client_data(&context);

        let response = if self.session.ready_for_validation(self.settings.validation_min_fields) {
            self.session.record_user_turn(message);
            self.session.trigger_validation().prompt()
        } else {
            match self.session.record_user_turn(message) {
                TurnOutcome::Completed { closing_message } => closing_message,
                TurnOutcome::Recorded | TurnOutcome::ResumeGathering { .. } => {
                    self.generate_response().await
                }
            }
        };

        self.session.record_assistant_turn(&response);
        AdapterReply::from_session(response, &self.session)
    }

    async fn generate_response(&self) -> String {
        let history = self.session.history();
        let window_start = history.len().saturating_sub(self.settings.history_window);

        let mut messages = Vec::with_capacity(history.len() - window_start + 1);
        messages.push(ChatMessage::system(AGENT_INSTRUCTIONS));
        messages.extend(history[window_start..].iter().map(ChatMessage::from));

        let request = CompletionRequest {
            session_id: self.session.session_id().map(str::to_string),
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        match self.llm.complete(&request).await {
            Ok(completion) => completion.content,
            Err(error) => {
                tracing::error!(
                    event_name = "intake.llm_failed",
                    session_id = self.session.session_id().unwrap_or(""),
                    error = %error,
                    "error generating response"
                );
                LLM_FAILURE_REPLY.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use intake_core::domain::conversation::ConversationTurn;
    use intake_core::domain::record::ClientRecord;
    use intake_core::flows::IntakeStage;
    use intake_core::prompts::{INITIAL_GREETING, LLM_FAILURE_REPLY};
    use intake_core::session::{IntakeSession, IntakeState};

    use super::TextModeAdapter;
    use crate::adapter::AdapterSettings;
    use crate::llm::{ChatRole, ScriptedLlm};

    fn adapter(state: IntakeState, llm: &ScriptedLlm) -> TextModeAdapter {
        TextModeAdapter::new(
            IntakeSession::from_state(state).with_session_id("text-1"),
            Arc::new(llm.clone()),
            AdapterSettings::default(),
        )
    }

    fn complete_buyer() -> ClientRecord {
        ClientRecord::new()
            .with("full_name", "Jane Doe")
            .with("email", "jane@x.com")
            .with("phone", "+15551234567")
            .with("preferred_contact", "email")
            .with("transaction_type", "buy")
            .with("timeline", "3 months")
            .with("budget", "$450k")
            .with("location", "Downtown")
            .with("bedrooms", 3u32)
            .with("property_type", "condo")
            .with("pre_approval", true)
            .with("payment_method", "cash")
    }

    #[tokio::test]
    async fn new_sessions_start_with_the_greeting() {
        let llm = ScriptedLlm::new("gpt-4o-mini");
        let adapter = adapter(IntakeState::default(), &llm);

        assert_eq!(adapter.session().history(), &[ConversationTurn::assistant(INITIAL_GREETING)]);
    }

    #[tokio::test]
    async fn early_turns_are_answered_by_the_llm() {
        let llm = ScriptedLlm::new("gpt-4o-mini");
        llm.push_reply("Great! What's your name?");
        let mut adapter = adapter(IntakeState::default(), &llm);

        let reply = adapter.process_message("Hi, I'd like to buy a home").await;

        assert_eq!(reply.response, "Great! What's your name?");
        assert_eq!(reply.client_data.text("transaction_type").as_deref(), Some("buy"));
        assert_eq!(reply.state.current_stage, IntakeStage::Gathering);
        assert_eq!(reply.state.conversation_history.len(), 3);

        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        let roles = requests[0].messages.iter().map(|message| message.role).collect::<Vec<_>>();
        assert_eq!(roles, vec![ChatRole::System, ChatRole::Assistant, ChatRole::User]);
        assert_eq!(requests[0].session_id.as_deref(), Some("text-1"));
        assert_eq!(requests[0].max_tokens, 500);
    }

    #[tokio::test]
    async fn history_sent_to_the_llm_is_windowed() {
        let llm = ScriptedLlm::new("gpt-4o-mini");
        let mut adapter = adapter(IntakeState::default(), &llm);

        for turn in 0..8 {
            adapter.process_message(&format!("message {turn}")).await;
        }

        let last = llm.requests().pop().expect("request");
        assert_eq!(last.messages.len(), 11);
        assert_eq!(last.messages[10].content, "message 7");
    }

    #[tokio::test]
    async fn llm_failures_fall_back_to_an_apology() {
        let llm = ScriptedLlm::new("gpt-4o-mini");
        llm.push_failure("connection refused");
        let mut adapter = adapter(IntakeState::default(), &llm);

        let reply = adapter.process_message("hello").await;

        assert_eq!(reply.response, LLM_FAILURE_REPLY);
        assert_eq!(reply.state.conversation_history.len(), 3);
    }

    #[tokio::test]
    async fn incomplete_records_get_clarification_questions() {
        let llm = ScriptedLlm::new("gpt-4o-mini");
        let state = IntakeState {
            client_data: ClientRecord::new()
                .with("full_name", "Jo")
                .with("email", "jo@x.com")
                .with("phone", "123"),
            current_stage: IntakeStage::Gathering,
            ..IntakeState::default()
        };
        let mut adapter = adapter(state, &llm);

        let reply = adapter.process_message("that's all for now").await;

        assert!(reply.response.starts_with("I need to clarify a few details"));
        assert_eq!(reply.state.current_stage, IntakeStage::Clarification);
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn confirmed_summary_closes_the_intake() {
        let llm = ScriptedLlm::new("gpt-4o-mini");
        let state = IntakeState {
            client_data: complete_buyer(),
            current_stage: IntakeStage::Gathering,
            ..IntakeState::default()
        };
        let mut adapter = adapter(state, &llm);

        let summary = adapter.process_message("I think that's everything").await;
        assert!(summary.response.contains("Here's a summary of the information you've provided:"));
        assert!(summary.state.validation_in_progress);
        assert_eq!(summary.state.current_stage, IntakeStage::Confirmation);

        let closing = adapter.process_message("Yes, looks good").await;
        assert!(closing.response.contains("your buy journey"));
        assert!(closing.state.intake_complete);
        assert_eq!(closing.state.current_stage, IntakeStage::Completed);
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn rejected_summary_resumes_gathering_with_llm_reply() {
        let llm = ScriptedLlm::new("gpt-4o-mini");
        llm.push_reply("Sure, what should I change?");
        let state = IntakeState {
            client_data: complete_buyer(),
            current_stage: IntakeStage::Confirmation,
            validation_in_progress: true,
            ..IntakeState::default()
        };
        let mut adapter = adapter(state, &llm);

        let reply = adapter.process_message("no, the budget is wrong").await;

        assert_eq!(reply.response, "Sure, what should I change?");
        assert!(!reply.state.validation_in_progress);
        assert_eq!(reply.state.current_stage, IntakeStage::Gathering);
    }
}
