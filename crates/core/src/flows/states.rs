use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeStage {
    #[default]
    Greeting,
    Gathering,
    Clarification,
    Confirmation,
    Completed,
}

impl IntakeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Gathering => "gathering",
            Self::Clarification => "clarification",
            Self::Confirmation => "confirmation",
            Self::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "greeting" => Some(Self::Greeting),
            "gathering" => Some(Self::Gathering),
            "clarification" => Some(Self::Clarification),
            "confirmation" => Some(Self::Confirmation),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for IntakeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntakeEvent {
    UserEngaged,
    /// The client replied while clarification questions were open.
    ClarificationAnswered,
    ValidationFailed,
    ValidationPassed,
    Confirmed,
    ConfirmationRejected,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FlowContext {
    /// A summary has been presented and the client has not answered yet.
    pub awaiting_confirmation: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    AskClarificationQuestions,
    PresentSummary,
    SendClosingMessage,
    ResumeGathering,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: IntakeStage,
    pub to: IntakeStage,
    pub event: IntakeEvent,
    pub actions: Vec<FlowAction>,
}
