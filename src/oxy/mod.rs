//! The `Oxy` handler trait and closure-based wrapper.
//!
//! An oxy is one registered unit of the runtime: an agent (conversational,
//! may fan out to other oxys through its [`TurnContext`]) or a tool (single
//! callable capability). The runtime core never looks inside a handler; it
//! only dispatches invocations and records the exchanged messages.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::MasError;
use crate::turn::TurnContext;
use crate::types::{AttachmentRef, MessageKind, Party, Payload};

/// Input delivered to a handler for one hop.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Who dispatched this hop (the user, or the calling oxy).
    pub caller: Party,
    /// Communication kind of the triggering message.
    pub kind: MessageKind,
    /// Payload of the triggering message.
    pub payload: Payload,
}

impl Invocation {
    /// Text content of the triggering payload, if any.
    pub fn text(&self) -> Option<&str> {
        self.payload.as_text()
    }

    /// Attachment references carried by the triggering payload.
    pub fn attachments(&self) -> &[AttachmentRef] {
        self.payload.attachment_refs()
    }
}

/// Core handler trait; implement to create custom agents and tools.
///
/// Nested hops go through the [`TurnContext`]: `ctx.call(...)` records the
/// outbound message, dispatches the recipient, records the reply, and
/// returns the recipient's output. The returned payload becomes this hop's
/// reply message in the ledger.
#[async_trait]
pub trait Oxy: Send + Sync {
    async fn handle(&self, invocation: Invocation, ctx: TurnContext)
        -> Result<Payload, MasError>;
}

/// Type alias for the boxed handler function.
type OxyHandler = dyn Fn(Invocation, TurnContext) -> Pin<Box<dyn Future<Output = Result<Payload, MasError>> + Send>>
    + Send
    + Sync;

/// Closure-based oxy for quick handler creation.
pub struct FnOxy {
    handler: Arc<OxyHandler>,
}

impl FnOxy {
    /// Create a handler from a closure.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(Invocation, TurnContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Payload, MasError>> + Send + 'static,
    {
        Self {
            handler: Arc::new(move |invocation, ctx| Box::pin(handler(invocation, ctx))),
        }
    }

    /// Convenience: wrap the closure in an `Arc<dyn Oxy>` ready for
    /// registration.
    pub fn shared<F, Fut>(handler: F) -> Arc<dyn Oxy>
    where
        F: Fn(Invocation, TurnContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Payload, MasError>> + Send + 'static,
    {
        Arc::new(Self::new(handler))
    }
}

#[async_trait]
impl Oxy for FnOxy {
    async fn handle(
        &self,
        invocation: Invocation,
        ctx: TurnContext,
    ) -> Result<Payload, MasError> {
        (self.handler)(invocation, ctx).await
    }
}

impl std::fmt::Debug for FnOxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnOxy").finish_non_exhaustive()
    }
}
