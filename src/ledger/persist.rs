//! Persisted ledger format.
//!
//! A session's ledger is the durable record of its conversation. The
//! snapshot serializes every message field, `causal_parent` included, in
//! causal order, so a restored ledger replays the exact history.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{MasError, Result};
use crate::types::{Message, MessageId};

use super::{Ledger, LedgerInner};

/// Serializable snapshot of a ledger's complete message sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerSnapshot {
    pub messages: Vec<Message>,
}

impl LedgerSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Ledger {
    /// Export the full history as a serializable snapshot.
    pub fn export(&self) -> LedgerSnapshot {
        let messages = self.messages().iter().map(|m| (**m).clone()).collect();
        LedgerSnapshot { messages }
    }

    /// Rebuild a ledger from a snapshot, revalidating the causal order.
    ///
    /// Rejects snapshots whose ids are not the dense append sequence or
    /// where a child precedes its causal parent.
    pub fn restore(snapshot: LedgerSnapshot) -> Result<Self> {
        for (i, message) in snapshot.messages.iter().enumerate() {
            if message.id != MessageId(i as u64) || message.created_at != i as u64 {
                return Err(MasError::InvalidState(format!(
                    "ledger snapshot out of sequence at position {i} (id {})",
                    message.id
                )));
            }
            if let Some(parent) = message.causal_parent {
                if parent >= message.id {
                    return Err(MasError::UnknownParent(parent));
                }
            }
        }

        let next_seq = snapshot.messages.len() as u64;
        let entries = snapshot.messages.into_iter().map(Arc::new).collect();
        Ok(Self {
            inner: std::sync::RwLock::new(LedgerInner { entries, next_seq }),
        })
    }
}
