//! Real-estate intake core: field schema, client record, extraction,
//! validation, summaries and the per-session state machine.
//!
//! Everything here is synchronous and in-memory. LLM and speech I/O live in
//! `intake-agent`.

pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod extract;
pub mod flows;
pub mod prompts;
pub mod schema;
pub mod session;
pub mod summary;
pub mod usage;
pub mod validation;

pub use domain::conversation::{ConversationTurn, TurnRole};
pub use domain::record::{ClientRecord, FieldValue};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use extract::{extract, ExtractionContext};
pub use flows::{IntakeEvent, IntakeStage};
pub use schema::{FieldSpec, Section};
pub use session::{IntakeSession, IntakeState, TurnOutcome, ValidationOutcome};
pub use summary::summarize;
pub use usage::{CostSummary, UsageTracker};
pub use validation::{generate_clarification_questions, validate_all, ValidationReport};
