//! Error types for oxymas.

use thiserror::Error;

use crate::types::MessageId;

/// Primary error type for all oxymas operations.
#[derive(Error, Debug)]
pub enum MasError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown recipient: no registered oxy named '{0}'")]
    UnknownRecipient(String),

    #[error("Unknown causal parent: message {0} is not in the ledger")]
    UnknownParent(MessageId),

    #[error("Hop to '{recipient}' timed out after {timeout_ms}ms")]
    HopTimeout { recipient: String, timeout_ms: u64 },

    #[error("Hop limit exceeded: turn dispatched more than {limit} hops")]
    HopLimitExceeded { limit: u32 },

    #[error("Turn conflict: session {session} already has an open turn")]
    TurnConflict { session: String },

    #[error("Handler error in '{name}': {message}")]
    Handler { name: String, message: String },

    #[error("Turn canceled")]
    Canceled,

    #[error("Attachment store error: {0}")]
    Attachment(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Coarse classification used by retry and reporting paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Routing,
    Ledger,
    Timeout,
    HopLimit,
    TurnLifecycle,
    Handler,
    Attachment,
    Network,
    Configuration,
    Serialization,
    Unknown,
}

impl MasError {
    /// Shorthand for a handler-side application error.
    pub fn handler(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownRecipient(_) => ErrorCategory::Routing,
            Self::UnknownParent(_) => ErrorCategory::Ledger,
            Self::HopTimeout { .. } => ErrorCategory::Timeout,
            Self::HopLimitExceeded { .. } => ErrorCategory::HopLimit,
            Self::TurnConflict { .. } | Self::Canceled | Self::InvalidState(_) => {
                ErrorCategory::TurnLifecycle
            }
            Self::Handler { .. } => ErrorCategory::Handler,
            Self::Attachment(_) => ErrorCategory::Attachment,
            Self::Network(_) => ErrorCategory::Network,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Io(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether the turn coordinator may retry the failed operation.
    ///
    /// Only transient hop failures qualify; `HopLimitExceeded` and
    /// `TurnConflict` are terminal by contract.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Timeout | ErrorCategory::Network
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, MasError>;
