//! The MAS runtime facade: one registry, many sessions.
//!
//! Thin SDK surface over the core contracts: `register_oxy` /
//! `unregister_oxy` mutate the shared registry, `submit_*` drive turns,
//! `get_history` reads the session ledger. The registry is injectable so
//! several runtimes (or tests) can share or isolate oxy spaces.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::MasConfig;
use crate::error::Result;
use crate::oxy::Oxy;
use crate::registry::{Capability, Registry};
use crate::session::Session;
use crate::turn::{TurnCoordinator, TurnHandle, TurnResult};
use crate::types::{AttachmentRef, Message, MessageDraft, SessionId};

/// Multi-agent runtime. Sessions run independently and concurrently; all
/// cross-session shared state lives in the registry.
pub struct Mas {
    registry: Arc<Registry>,
    coordinator: TurnCoordinator,
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
}

impl Mas {
    /// Create a runtime with a fresh registry.
    pub fn new(config: MasConfig) -> Self {
        Self::with_registry(Arc::new(Registry::new()), config)
    }

    /// Create a runtime around an existing (possibly shared) registry.
    pub fn with_registry(registry: Arc<Registry>, config: MasConfig) -> Self {
        let coordinator = TurnCoordinator::new(registry.clone(), config);
        Self {
            registry,
            coordinator,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &MasConfig {
        self.coordinator.config()
    }

    /// Register (or replace) an oxy in the live system. Open turns keep
    /// the handlers they already resolved.
    pub fn register_oxy(
        &self,
        name: impl Into<String>,
        capability: Capability,
        handler: Arc<dyn Oxy>,
    ) {
        self.registry.register(name, capability, handler);
    }

    /// Remove an oxy. Hops already dispatched with it run to completion.
    pub fn unregister_oxy(&self, name: &str) -> bool {
        self.registry.unregister(name)
    }

    /// Get or create the session for a conversation identity.
    pub fn session(&self, session_id: impl Into<SessionId>) -> Arc<Session> {
        let session_id = session_id.into();
        self.sessions
            .lock()
            .expect("session map lock poisoned")
            .entry(session_id.clone())
            .or_insert_with(|| {
                tracing::debug!(session = %session_id, "session created");
                Arc::new(Session::new(session_id.clone()))
            })
            .clone()
    }

    /// Look up an existing session without creating one.
    pub fn get_session(&self, session_id: &SessionId) -> Option<Arc<Session>> {
        self.sessions
            .lock()
            .expect("session map lock poisoned")
            .get(session_id)
            .cloned()
    }

    /// Submit a user text message and await the turn's settlement.
    pub async fn submit_message(
        &self,
        session_id: impl Into<SessionId>,
        recipient: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<TurnResult> {
        self.submit_draft(session_id, MessageDraft::user_text(recipient, text))
            .await
    }

    /// Submit a user message carrying attachment references.
    pub async fn submit_attachments(
        &self,
        session_id: impl Into<SessionId>,
        recipient: impl Into<String>,
        refs: Vec<AttachmentRef>,
    ) -> Result<TurnResult> {
        self.submit_draft(session_id, MessageDraft::user_attachments(recipient, refs))
            .await
    }

    /// Submit an arbitrary turn-initiating draft and await settlement.
    pub async fn submit_draft(
        &self,
        session_id: impl Into<SessionId>,
        draft: MessageDraft,
    ) -> Result<TurnResult> {
        let session = self.session(session_id);
        self.coordinator.run(session, draft).await
    }

    /// Submit without awaiting: returns an abortable [`TurnHandle`].
    pub fn submit_detached(
        &self,
        session_id: impl Into<SessionId>,
        draft: MessageDraft,
    ) -> Result<TurnHandle> {
        let session = self.session(session_id);
        self.coordinator.start(session, draft)
    }

    /// Conversation history for a session, if it exists.
    pub fn get_history(&self, session_id: &SessionId) -> Option<Vec<Arc<Message>>> {
        self.get_session(session_id).map(|s| s.history())
    }

    /// Identities of all live sessions.
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions
            .lock()
            .expect("session map lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// External teardown: drop a session and its ledger.
    pub fn remove_session(&self, session_id: &SessionId) -> bool {
        self.sessions
            .lock()
            .expect("session map lock poisoned")
            .remove(session_id)
            .is_some()
    }
}

impl std::fmt::Debug for Mas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mas")
            .field("registry", &self.registry)
            .field("sessions", &self.session_ids())
            .finish()
    }
}
