//! Intake agent runtime: the pieces around the core state machine that talk
//! to the outside world.
//!
//! - `llm` - chat-completion client trait, the OpenAI-compatible client and a
//!   usage-metering wrapper
//! - `text` / `voice` - mode adapters that turn one client utterance into one
//!   reply
//! - `store` - where session state lives between turns
//! - `runtime` - per-session orchestration and mode switching
//!
//! The LLM only phrases replies in text mode. Field extraction, validation
//! and stage changes stay deterministic in `intake-core`.

pub mod adapter;
pub mod llm;
pub mod runtime;
pub mod store;
pub mod text;
pub mod voice;

pub use adapter::{AdapterReply, AdapterSettings};
pub use llm::{LlmClient, OpenAiCompatibleClient, ScriptedLlm, UsageTrackingLlm};
pub use runtime::{Greeting, IntakeMode, IntakeRuntime, ModeSwitch, RuntimeSettings};
pub use store::{InMemorySessionStore, SessionStore, StoreError};
pub use text::TextModeAdapter;
pub use voice::VoiceModeAdapter;
