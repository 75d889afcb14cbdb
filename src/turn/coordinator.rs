//! Drives one turn to settlement.
//!
//! The coordinator opens the turn through the session (sequential-turn
//! guard), appends the initiating message, and dispatches the root hop.
//! Handlers fan out through [`TurnContext::call`], which records each
//! nested hop and its reply in the ledger with causal-parent links. The
//! turn settles when the root hop's causal tree has fully settled; it
//! fails on hop-limit breach, exhausted retries, cancellation, or a
//! handler error the caller did not tolerate.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::config::MasConfig;
use crate::error::{MasError, Result};
use crate::oxy::Invocation;
use crate::registry::{Capability, Registry};
use crate::session::Session;
use crate::turn::{TurnHandle, TurnResult, TurnStatus};
use crate::types::{Message, MessageDraft, MessageId, MessageKind, Party, Payload, TurnId};
use crate::util::{with_hop_timeout, RetryPolicy};

/// Shared state of one in-flight turn.
struct TurnState {
    turn_id: TurnId,
    session: Arc<Session>,
    registry: Arc<Registry>,
    config: MasConfig,
    /// Dispatch counter; one increment per hop, never decremented.
    hops: AtomicU32,
    cancel: CancellationToken,
    /// First turn-fatal error (hop limit). Set once; cancels the token so
    /// in-flight siblings stop dispatching.
    fatal: Mutex<Option<MasError>>,
}

impl TurnState {
    /// Account for one dispatch against the hop ceiling.
    fn begin_hop(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(MasError::Canceled);
        }
        let hop = self.hops.fetch_add(1, Ordering::SeqCst) + 1;
        if hop > self.config.max_hops {
            let limit = self.config.max_hops;
            self.trip_fatal(MasError::HopLimitExceeded { limit });
            return Err(MasError::HopLimitExceeded { limit });
        }
        Ok(())
    }

    fn trip_fatal(&self, err: MasError) {
        let mut fatal = self.fatal.lock().expect("turn state lock poisoned");
        if fatal.is_none() {
            *fatal = Some(err);
        }
        drop(fatal);
        self.cancel.cancel();
    }

    fn take_fatal(&self) -> Option<MasError> {
        self.fatal.lock().expect("turn state lock poisoned").take()
    }
}

/// Settles the turn as `Failed` if the driver unwinds or is dropped
/// before reaching a terminal status, so the session's open-turn slot is
/// always released.
struct SettleGuard {
    state: Arc<TurnState>,
    armed: bool,
}

impl SettleGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        if self.armed {
            let hops = self.state.hops.load(Ordering::SeqCst);
            self.state
                .session
                .settle_turn(self.state.turn_id, TurnStatus::Failed, hops);
        }
    }
}

/// Execution context handed to a handler for the duration of its hop.
///
/// Cloneable and cheap; `current`/`trigger` pin the handler's identity and
/// the message that triggered it, so nested calls carry the right sender
/// and causal parent.
#[derive(Clone)]
pub struct TurnContext {
    state: Arc<TurnState>,
    /// Identity the current handler acts as.
    current: Party,
    /// Message that triggered the current hop.
    trigger: MessageId,
}

impl TurnContext {
    pub fn turn_id(&self) -> TurnId {
        self.state.turn_id
    }

    /// Whether the turn has been cancelled (externally or by a fatal
    /// error). Long-running handlers should poll this between steps.
    pub fn is_cancelled(&self) -> bool {
        self.state.cancel.is_cancelled()
    }

    /// Id of the message that triggered the current hop.
    pub fn trigger(&self) -> MessageId {
        self.trigger
    }

    /// Snapshot of this turn's messages appended so far.
    pub fn read_turn(&self) -> Vec<Arc<Message>> {
        self.state.session.ledger().read(self.state.turn_id)
    }

    /// Dispatch a nested hop to `recipient` and await its settlement.
    ///
    /// Records the outbound message (causal parent = this hop's trigger),
    /// resolves the recipient snapshot-at-dispatch, runs the handler under
    /// the hop deadline with the configured retry budget, records the
    /// reply, and returns the recipient's output payload.
    ///
    /// Sibling hops run concurrently when the caller joins several `call`
    /// futures. Errors propagate to the caller; an agent that tolerates a
    /// partial hop failure may match on the error and continue.
    pub async fn call(
        &self,
        recipient: impl Into<String>,
        kind: MessageKind,
        payload: Payload,
    ) -> Result<Payload> {
        let recipient = recipient.into();
        self.state.begin_hop()?;

        let outbound = self.state.session.ledger().append(
            self.state.turn_id,
            MessageDraft::hop(
                self.current.clone(),
                recipient,
                kind,
                payload,
                self.trigger,
            ),
        )?;

        dispatch(&self.state, self.current.clone(), &outbound).await
    }

    /// Convenience: dispatch a tool call with JSON arguments.
    pub async fn call_tool(
        &self,
        recipient: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Result<Payload> {
        self.call(recipient, MessageKind::ToolCall, Payload::json(arguments))
            .await
    }

    /// Convenience: dispatch a text message to another agent.
    pub async fn call_agent(
        &self,
        recipient: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<Payload> {
        self.call(recipient, MessageKind::Text, Payload::text(text))
            .await
    }

    /// Dispatch several hops concurrently and await them all.
    ///
    /// Outbound messages share this hop's trigger as their causal parent,
    /// so replies may interleave in any order consistent with it. Fails on
    /// the first hop error; already-appended messages remain in the ledger.
    pub async fn call_all(
        &self,
        calls: impl IntoIterator<Item = (String, MessageKind, Payload)>,
    ) -> Result<Vec<Payload>> {
        futures::future::try_join_all(
            calls
                .into_iter()
                .map(|(recipient, kind, payload)| self.call(recipient, kind, payload)),
        )
        .await
    }
}

impl std::fmt::Debug for TurnContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnContext")
            .field("turn_id", &self.state.turn_id)
            .field("current", &self.current)
            .field("trigger", &self.trigger)
            .finish()
    }
}

/// Resolve and run the hop described by an already-appended outbound
/// message, then append the reply. Retries share the same causal parent.
async fn dispatch(
    state: &Arc<TurnState>,
    caller: Party,
    outbound: &Arc<Message>,
) -> Result<Payload> {
    let name = outbound
        .recipient
        .name()
        .ok_or_else(|| MasError::InvalidState("hop recipient must be a named oxy".into()))?
        .to_string();

    // Snapshot-at-dispatch: the entry resolved here stays in effect for
    // this hop even if the name is replaced or unregistered mid-call.
    let entry = state.registry.resolve(&name)?;

    tracing::debug!(
        turn_id = %state.turn_id,
        message = %outbound.id,
        recipient = %name,
        capability = %entry.capability,
        "hop dispatch"
    );

    let ctx = TurnContext {
        state: state.clone(),
        current: outbound.recipient.clone(),
        trigger: outbound.id,
    };
    let invocation = Invocation {
        caller: caller.clone(),
        kind: outbound.kind,
        payload: outbound.payload.clone(),
    };

    let timeout = state.config.hop_timeout();
    let policy = RetryPolicy::from_budget(state.config.retry_budget);
    let handler = entry.handler.clone();

    let output = policy
        .execute(|| {
            let handler = handler.clone();
            let invocation = invocation.clone();
            let ctx = ctx.clone();
            let name = name.clone();
            async move { with_hop_timeout(&name, timeout, handler.handle(invocation, ctx)).await }
        })
        .await?;

    let reply = state.session.ledger().append(
        state.turn_id,
        MessageDraft::reply(
            outbound.recipient.clone(),
            caller,
            reply_kind(entry.capability, &output),
            output,
            outbound.id,
        ),
    )?;

    tracing::debug!(
        turn_id = %state.turn_id,
        message = %reply.id,
        sender = %reply.sender,
        "hop settled"
    );
    Ok(reply.payload.clone())
}

fn reply_kind(capability: Capability, output: &Payload) -> MessageKind {
    match (output, capability) {
        (Payload::Attachments { .. }, _) => MessageKind::AttachmentRef,
        (_, Capability::Tool) => MessageKind::ToolResult,
        (_, Capability::Agent) => MessageKind::Text,
    }
}

/// Coordinates turns for sessions against one registry and config.
#[derive(Clone)]
pub struct TurnCoordinator {
    registry: Arc<Registry>,
    config: MasConfig,
}

impl TurnCoordinator {
    pub fn new(registry: Arc<Registry>, config: MasConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &MasConfig {
        &self.config
    }

    /// Run a turn to settlement and await its result.
    ///
    /// Fails fast with [`MasError::TurnConflict`] if the session already
    /// has an open turn, and [`MasError::UnknownRecipient`] surfaces as
    /// the turn's failed result.
    pub async fn run(&self, session: Arc<Session>, draft: MessageDraft) -> Result<TurnResult> {
        let (turn_id, initiating) = session.begin_turn(draft)?;
        let cancel = CancellationToken::new();
        Ok(self.drive(session, turn_id, initiating, cancel).await)
    }

    /// Start a turn on a background task, returning an abortable handle.
    pub fn start(&self, session: Arc<Session>, draft: MessageDraft) -> Result<TurnHandle> {
        let (turn_id, initiating) = session.begin_turn(draft)?;
        let (handle, cancel, result_tx) = TurnHandle::new(turn_id);
        let coordinator = self.clone();
        tokio::spawn(async move {
            let result = coordinator.drive(session, turn_id, initiating, cancel).await;
            let _ = result_tx.send(result);
        });
        Ok(handle)
    }

    async fn drive(
        &self,
        session: Arc<Session>,
        turn_id: TurnId,
        initiating: Arc<Message>,
        cancel: CancellationToken,
    ) -> TurnResult {
        let state = Arc::new(TurnState {
            turn_id,
            session: session.clone(),
            registry: self.registry.clone(),
            config: self.config.clone(),
            hops: AtomicU32::new(0),
            cancel: cancel.clone(),
            fatal: Mutex::new(None),
        });

        let mut guard = SettleGuard {
            state: state.clone(),
            armed: true,
        };

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(MasError::Canceled),
            outcome = root_dispatch(&state, &initiating) => outcome,
        };

        let hop_count = state.hops.load(Ordering::SeqCst);
        let messages = session.ledger().read(turn_id);
        let result = match (state.take_fatal(), outcome) {
            (Some(fatal), _) => TurnResult::failed(turn_id, hop_count, messages, fatal.to_string()),
            (None, Ok(())) => TurnResult::settled(turn_id, hop_count, messages),
            (None, Err(err)) => TurnResult::failed(turn_id, hop_count, messages, err.to_string()),
        };

        guard.disarm();
        session.settle_turn(turn_id, result.status, hop_count);
        if result.status == TurnStatus::Failed {
            tracing::warn!(
                turn_id = %turn_id,
                hop_count,
                error = result.error.as_deref().unwrap_or(""),
                "turn failed"
            );
        }
        result
    }
}

/// Dispatch the root hop: the initiating message is already appended, so
/// this only accounts for the hop and runs the shared dispatch path.
async fn root_dispatch(state: &Arc<TurnState>, initiating: &Arc<Message>) -> Result<()> {
    state.begin_hop()?;
    dispatch(state, initiating.sender.clone(), initiating).await?;
    Ok(())
}
