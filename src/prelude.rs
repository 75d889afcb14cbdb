//! Convenience re-exports for common use.

pub use crate::attachment::{materialize, AttachmentStore, MemoryAttachmentStore};
pub use crate::config::{MasConfig, TurnConcurrency};
pub use crate::error::{MasError, Result};
pub use crate::ledger::{Ledger, LedgerSnapshot};
pub use crate::mas::Mas;
pub use crate::oxy::{FnOxy, Invocation, Oxy};
pub use crate::registry::{Capability, Registry};
pub use crate::session::Session;
pub use crate::turn::{TurnContext, TurnHandle, TurnResult, TurnStatus};
pub use crate::types::{
    AttachmentRef, Message, MessageDraft, MessageId, MessageKind, Party, Payload, SessionId,
    TurnId,
};
