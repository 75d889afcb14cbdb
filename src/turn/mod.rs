//! Turn model and coordination.
//!
//! A turn is one complete causal tree of message exchanges triggered by a
//! single inbound message. The [`TurnCoordinator`] drives a turn to
//! settlement; [`TurnHandle`] lets a caller await or abort an in-flight
//! turn.

pub mod coordinator;

pub use coordinator::{TurnContext, TurnCoordinator};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::types::{Message, MessageId, SessionId, TurnId};

/// Turn lifecycle status.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnStatus {
    Open,
    Settled,
    Failed,
}

/// Record of one turn within a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub turn_id: TurnId,
    pub session_id: SessionId,
    pub initiating_message_id: MessageId,
    pub status: TurnStatus,
    pub hop_count: u32,
}

/// Terminal result of a turn, exposed atomically on settlement: final
/// status plus the turn's ledger slice.
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub turn_id: TurnId,
    pub status: TurnStatus,
    pub hop_count: u32,
    pub error: Option<String>,
    /// The turn's messages in causal order, failed turns included.
    pub messages: Vec<Arc<Message>>,
    pub finished_at: DateTime<Utc>,
}

impl TurnResult {
    pub fn settled(turn_id: TurnId, hop_count: u32, messages: Vec<Arc<Message>>) -> Self {
        Self {
            turn_id,
            status: TurnStatus::Settled,
            hop_count,
            error: None,
            messages,
            finished_at: Utc::now(),
        }
    }

    pub fn failed(
        turn_id: TurnId,
        hop_count: u32,
        messages: Vec<Arc<Message>>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            turn_id,
            status: TurnStatus::Failed,
            hop_count,
            error: Some(error.into()),
            messages,
            finished_at: Utc::now(),
        }
    }

    /// Text of the final reply to the user, if the turn settled with one.
    pub fn output_text(&self) -> Option<&str> {
        self.messages.last().and_then(|m| m.text())
    }
}

/// Handle for an in-flight turn.
#[derive(Debug)]
pub struct TurnHandle {
    turn_id: TurnId,
    cancel: CancellationToken,
    result_rx: oneshot::Receiver<TurnResult>,
}

impl TurnHandle {
    /// Create a handle and expose the driver-side channels.
    pub(crate) fn new(turn_id: TurnId) -> (Self, CancellationToken, oneshot::Sender<TurnResult>) {
        let cancel = CancellationToken::new();
        let (result_tx, result_rx) = oneshot::channel();
        (
            Self {
                turn_id,
                cancel: cancel.clone(),
                result_rx,
            },
            cancel,
            result_tx,
        )
    }

    pub fn turn_id(&self) -> TurnId {
        self.turn_id
    }

    /// Cancel the turn: no new hops are dispatched, the turn reports
    /// `Failed`, and already-appended messages remain in the ledger.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    /// Await the turn's terminal result.
    pub async fn wait(self) -> TurnResult {
        let turn_id = self.turn_id;
        self.result_rx
            .await
            .unwrap_or_else(|_| TurnResult::failed(turn_id, 0, Vec::new(), "turn driver dropped"))
    }
}
