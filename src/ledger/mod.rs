//! The interaction ledger: an append-only, causally ordered log of
//! messages for one session.
//!
//! `append` is the single serialization point for a session. Ordering is
//! enforced structurally: a draft may only name a `causal_parent` the
//! ledger has already assigned, so the log is always a valid topological
//! order of the causal-parent DAG: a child can never precede its parent.
//! Entries are `Arc<Message>` and immutable once appended; reads hand out
//! snapshots and never observe partial messages. Readers do hold the read
//! lock while cloning the `Arc` entries, so an append can wait out a
//! concurrent read for that short window; entries themselves are never
//! copied.

pub mod persist;

pub use persist::LedgerSnapshot;

use std::sync::{Arc, RwLock};

use crate::error::{MasError, Result};
use crate::types::{Message, MessageDraft, MessageId, TurnId};

#[derive(Default)]
struct LedgerInner {
    entries: Vec<Arc<Message>>,
    /// Logical sequence counter; the next id to assign.
    next_seq: u64,
}

/// Append-only causal log. One per session.
#[derive(Default)]
pub struct Ledger {
    inner: RwLock<LedgerInner>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit a draft to the log, assigning its id and logical timestamp.
    ///
    /// Fails with [`MasError::UnknownParent`] if the draft names a causal
    /// parent the ledger has not assigned yet.
    pub fn append(&self, turn_id: TurnId, draft: MessageDraft) -> Result<Arc<Message>> {
        let mut inner = self.inner.write().expect("ledger lock poisoned");

        if let Some(parent) = draft.causal_parent {
            if parent.0 >= inner.next_seq {
                return Err(MasError::UnknownParent(parent));
            }
        }

        let seq = inner.next_seq;
        let message = Arc::new(Message {
            id: MessageId(seq),
            turn_id,
            sender: draft.sender,
            recipient: draft.recipient,
            kind: draft.kind,
            payload: draft.payload,
            causal_parent: draft.causal_parent,
            created_at: seq,
        });
        inner.entries.push(message.clone());
        inner.next_seq = seq + 1;

        tracing::debug!(
            id = seq,
            turn_id = %turn_id,
            sender = %message.sender,
            recipient = %message.recipient,
            kind = %message.kind,
            "ledger append"
        );
        Ok(message)
    }

    /// Messages belonging to one turn, in append order.
    pub fn read(&self, turn_id: TurnId) -> Vec<Arc<Message>> {
        self.inner
            .read()
            .expect("ledger lock poisoned")
            .entries
            .iter()
            .filter(|m| m.turn_id == turn_id)
            .cloned()
            .collect()
    }

    /// Messages appended strictly after the given id, in append order.
    pub fn read_since(&self, id: MessageId) -> Vec<Arc<Message>> {
        let inner = self.inner.read().expect("ledger lock poisoned");
        let start = id.0.saturating_add(1).min(inner.entries.len() as u64) as usize;
        inner.entries[start..].to_vec()
    }

    /// Snapshot of the full history.
    pub fn messages(&self) -> Vec<Arc<Message>> {
        self.inner
            .read()
            .expect("ledger lock poisoned")
            .entries
            .clone()
    }

    /// Look up one message by id.
    pub fn get(&self, id: MessageId) -> Option<Arc<Message>> {
        self.inner
            .read()
            .expect("ledger lock poisoned")
            .entries
            .get(id.0 as usize)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("ledger lock poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Id of the most recently appended message, if any.
    pub fn last_id(&self) -> Option<MessageId> {
        let inner = self.inner.read().expect("ledger lock poisoned");
        inner.entries.last().map(|m| m.id)
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MessageKind, Party, Payload};
    use uuid::Uuid;

    fn user_draft(text: &str) -> MessageDraft {
        MessageDraft::user_text("master_agent", text)
    }

    #[test]
    fn append_assigns_monotonic_ids() {
        let ledger = Ledger::new();
        let turn = Uuid::new_v4();

        let m0 = ledger.append(turn, user_draft("one")).unwrap();
        let m1 = ledger.append(turn, user_draft("two")).unwrap();

        assert_eq!(m0.id, MessageId(0));
        assert_eq!(m1.id, MessageId(1));
        assert_eq!(m0.created_at, 0);
        assert_eq!(m1.created_at, 1);
    }

    #[test]
    fn forward_parent_reference_is_rejected() {
        let ledger = Ledger::new();
        let turn = Uuid::new_v4();
        let draft = MessageDraft::hop(
            Party::oxy("agent_a"),
            "tool_t",
            MessageKind::ToolCall,
            Payload::Empty,
            MessageId(5),
        );
        let err = ledger.append(turn, draft).unwrap_err();
        assert!(matches!(err, MasError::UnknownParent(MessageId(5))));
        assert!(ledger.is_empty());
    }

    #[test]
    fn child_appends_after_existing_parent() {
        let ledger = Ledger::new();
        let turn = Uuid::new_v4();
        let parent = ledger.append(turn, user_draft("m0")).unwrap();

        let child = ledger
            .append(
                turn,
                MessageDraft::hop(
                    Party::oxy("master_agent"),
                    "search_tool",
                    MessageKind::ToolCall,
                    Payload::text("query"),
                    parent.id,
                ),
            )
            .unwrap();
        assert_eq!(child.causal_parent, Some(parent.id));
        assert!(child.id > parent.id);
    }

    #[test]
    fn read_filters_by_turn() {
        let ledger = Ledger::new();
        let turn_a = Uuid::new_v4();
        let turn_b = Uuid::new_v4();

        ledger.append(turn_a, user_draft("a0")).unwrap();
        ledger.append(turn_b, user_draft("b0")).unwrap();
        ledger.append(turn_a, user_draft("a1")).unwrap();

        let a = ledger.read(turn_a);
        assert_eq!(a.len(), 2);
        assert!(a.iter().all(|m| m.turn_id == turn_a));
        assert_eq!(ledger.read(turn_b).len(), 1);
    }

    #[test]
    fn read_since_returns_strict_suffix() {
        let ledger = Ledger::new();
        let turn = Uuid::new_v4();
        for i in 0..5 {
            ledger.append(turn, user_draft(&format!("m{i}"))).unwrap();
        }

        let tail = ledger.read_since(MessageId(2));
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].id, MessageId(3));
        assert_eq!(tail[1].id, MessageId(4));

        assert!(ledger.read_since(MessageId(4)).is_empty());
        assert!(ledger.read_since(MessageId(99)).is_empty());
    }

    #[test]
    fn concurrent_appends_form_total_order_respecting_causality() {
        let ledger = Arc::new(Ledger::new());
        let turn = Uuid::new_v4();
        let root = ledger.append(turn, user_draft("root")).unwrap();

        // Sibling hops appended from multiple threads, all children of root.
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ledger = ledger.clone();
                let parent = root.id;
                std::thread::spawn(move || {
                    ledger
                        .append(
                            turn,
                            MessageDraft::hop(
                                Party::oxy("master_agent"),
                                format!("tool_{i}"),
                                MessageKind::ToolCall,
                                Payload::Empty,
                                parent,
                            ),
                        )
                        .unwrap()
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let all = ledger.messages();
        assert_eq!(all.len(), 9);
        // Ids are dense and every child follows its parent.
        for (i, m) in all.iter().enumerate() {
            assert_eq!(m.id, MessageId(i as u64));
            if let Some(parent) = m.causal_parent {
                assert!(parent < m.id);
            }
        }
    }

    #[test]
    fn get_and_last_id() {
        let ledger = Ledger::new();
        assert!(ledger.last_id().is_none());
        let turn = Uuid::new_v4();
        let m = ledger.append(turn, user_draft("m")).unwrap();
        assert_eq!(ledger.last_id(), Some(m.id));
        assert_eq!(ledger.get(m.id).unwrap().id, m.id);
        assert!(ledger.get(MessageId(7)).is_none());
    }
}
