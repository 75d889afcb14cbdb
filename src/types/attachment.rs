//! Attachment references: opaque pointers to externally stored content.

use serde::{Deserialize, Serialize};

/// Reference to multimodal content held by an external attachment store.
///
/// The ledger only ever carries these references, never raw bytes, so
/// ledger size is bounded by message count rather than payload size.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachmentRef {
    /// Content-addressed identifier (URL-safe base64 of the SHA-256).
    pub ref_id: String,
    /// MIME type of the stored content.
    pub media_type: String,
    /// Stable, externally fetchable URL produced by the store adapter.
    pub external_url: String,
    /// Size of the stored content in bytes.
    pub byte_size: u64,
}

impl AttachmentRef {
    pub fn new(
        ref_id: impl Into<String>,
        media_type: impl Into<String>,
        external_url: impl Into<String>,
        byte_size: u64,
    ) -> Self {
        Self {
            ref_id: ref_id.into(),
            media_type: media_type.into(),
            external_url: external_url.into(),
            byte_size,
        }
    }
}
