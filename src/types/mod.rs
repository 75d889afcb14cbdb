//! Core data model: identifiers, messages, attachment references.

pub mod attachment;
pub mod ids;
pub mod message;

pub use attachment::AttachmentRef;
pub use ids::{MessageId, SessionId, TurnId};
pub use message::{Message, MessageDraft, MessageKind, Party, Payload};
