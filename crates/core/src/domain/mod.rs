pub mod conversation;
pub mod record;

pub use conversation::{ConversationTurn, TurnRole};
pub use record::{ClientRecord, FieldValue};
