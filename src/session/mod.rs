//! Session: one conversation identity, its turns, and its ledger.

use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::error::{MasError, Result};
use crate::ledger::Ledger;
use crate::turn::{Turn, TurnStatus};
use crate::types::{Message, MessageDraft, SessionId, TurnId};

#[derive(Default)]
struct SessionState {
    open: Option<TurnId>,
    turns: Vec<Turn>,
}

/// Per-conversation state. A session exclusively owns its ledger and its
/// turn sequence; turns are strictly sequential (one open at a time).
///
/// Sessions are created on first user message and removed only by
/// explicit external teardown; the core never evicts them.
pub struct Session {
    session_id: SessionId,
    ledger: Ledger,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            ledger: Ledger::new(),
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Rebuild a session around a restored ledger.
    pub fn with_ledger(session_id: SessionId, ledger: Ledger) -> Self {
        Self {
            session_id,
            ledger,
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Open a new turn and append its initiating message atomically.
    ///
    /// Fails with [`MasError::TurnConflict`] while another turn is open:
    /// turns are strictly sequential per session.
    pub fn begin_turn(&self, draft: MessageDraft) -> Result<(TurnId, Arc<Message>)> {
        let mut state = self.state.lock().expect("session lock poisoned");
        if state.open.is_some() {
            return Err(MasError::TurnConflict {
                session: self.session_id.to_string(),
            });
        }

        let turn_id = Uuid::new_v4();
        let initiating = self.ledger.append(turn_id, draft)?;
        state.turns.push(Turn {
            turn_id,
            session_id: self.session_id.clone(),
            initiating_message_id: initiating.id,
            status: TurnStatus::Open,
            hop_count: 0,
        });
        state.open = Some(turn_id);

        tracing::debug!(
            session = %self.session_id,
            turn_id = %turn_id,
            initiating = %initiating.id,
            "turn opened"
        );
        Ok((turn_id, initiating))
    }

    /// Record a turn's terminal status and release the open slot.
    pub fn settle_turn(&self, turn_id: TurnId, status: TurnStatus, hop_count: u32) {
        let mut state = self.state.lock().expect("session lock poisoned");
        if state.open == Some(turn_id) {
            state.open = None;
        }
        if let Some(turn) = state.turns.iter_mut().find(|t| t.turn_id == turn_id) {
            turn.status = status;
            turn.hop_count = hop_count;
        }
        tracing::debug!(
            session = %self.session_id,
            turn_id = %turn_id,
            status = %status,
            hop_count,
            "turn settled"
        );
    }

    /// The currently open turn, if any.
    pub fn open_turn(&self) -> Option<TurnId> {
        self.state.lock().expect("session lock poisoned").open
    }

    /// Snapshot of the turn sequence.
    pub fn turns(&self) -> Vec<Turn> {
        self.state
            .lock()
            .expect("session lock poisoned")
            .turns
            .clone()
    }

    /// Full conversation history snapshot.
    pub fn history(&self) -> Vec<Arc<Message>> {
        self.ledger.messages()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id)
            .field("messages", &self.ledger.len())
            .field("open_turn", &self.open_turn())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> MessageDraft {
        MessageDraft::user_text("master_agent", "hello")
    }

    #[test]
    fn begin_turn_opens_and_appends() {
        let session = Session::new(SessionId::new("s1"));
        let (turn_id, m0) = session.begin_turn(draft()).unwrap();

        assert_eq!(session.open_turn(), Some(turn_id));
        assert!(m0.is_turn_initiating());
        let turns = session.turns();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].status, TurnStatus::Open);
        assert_eq!(turns[0].initiating_message_id, m0.id);
    }

    #[test]
    fn second_turn_while_open_conflicts() {
        let session = Session::new(SessionId::new("s1"));
        session.begin_turn(draft()).unwrap();

        let err = session.begin_turn(draft()).unwrap_err();
        assert!(matches!(err, MasError::TurnConflict { session } if session == "s1"));
    }

    #[test]
    fn settle_releases_open_slot_for_next_turn() {
        let session = Session::new(SessionId::new("s1"));
        let (turn_id, _) = session.begin_turn(draft()).unwrap();

        session.settle_turn(turn_id, TurnStatus::Settled, 2);
        assert_eq!(session.open_turn(), None);
        assert_eq!(session.turns()[0].status, TurnStatus::Settled);
        assert_eq!(session.turns()[0].hop_count, 2);

        // Next turn opens cleanly.
        session.begin_turn(draft()).unwrap();
    }

    #[test]
    fn failed_turn_keeps_its_messages() {
        let session = Session::new(SessionId::new("s1"));
        let (turn_id, _) = session.begin_turn(draft()).unwrap();
        session.settle_turn(turn_id, TurnStatus::Failed, 1);

        assert_eq!(session.history().len(), 1);
        assert_eq!(session.turns()[0].status, TurnStatus::Failed);
    }

    #[test]
    fn with_ledger_resumes_sequence() {
        let session = Session::new(SessionId::new("s1"));
        let (turn_id, _) = session.begin_turn(draft()).unwrap();
        session.settle_turn(turn_id, TurnStatus::Settled, 0);

        let restored = Ledger::restore(session.ledger().export()).unwrap();
        let resumed = Session::with_ledger(SessionId::new("s1"), restored);
        let (_, m1) = resumed.begin_turn(draft()).unwrap();
        assert_eq!(m1.id.0, 1);
    }
}
