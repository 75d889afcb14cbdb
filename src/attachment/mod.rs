//! Attachment store adapters.
//!
//! The runtime core never touches raw multimodal bytes: callers
//! [`materialize`] a payload through an [`AttachmentStore`] and circulate
//! only the resulting [`AttachmentRef`]. Reference ids are
//! content-addressed (URL-safe base64 of the SHA-256), which makes
//! `store` idempotent-safe to retry.

pub mod http;

pub use http::HttpAttachmentStore;

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::types::AttachmentRef;

/// External storage for raw attachment bytes.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Persist `bytes` under the content-addressed `ref_id`, returning a
    /// stable, externally fetchable URL. Must be safe to call again with
    /// the same `ref_id` and bytes. Zero-byte payloads are valid.
    async fn store(&self, ref_id: &str, bytes: &[u8], media_type: &str) -> Result<String>;
}

/// Content-addressed reference id for a byte payload.
pub fn content_ref_id(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

/// Convert a raw payload into an [`AttachmentRef`] via the given store.
pub async fn materialize(
    store: &dyn AttachmentStore,
    bytes: &[u8],
    media_type: &str,
) -> Result<AttachmentRef> {
    let ref_id = content_ref_id(bytes);
    let external_url = store.store(&ref_id, bytes, media_type).await?;
    Ok(AttachmentRef {
        ref_id,
        media_type: media_type.to_string(),
        external_url,
        byte_size: bytes.len() as u64,
    })
}

/// In-memory attachment store for tests and local demos.
#[derive(Default)]
pub struct MemoryAttachmentStore {
    blobs: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryAttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieve stored bytes by reference id.
    pub fn get(&self, ref_id: &str) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .expect("attachment store lock poisoned")
            .get(ref_id)
            .map(|(bytes, _)| bytes.clone())
    }

    pub fn len(&self) -> usize {
        self.blobs
            .lock()
            .expect("attachment store lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AttachmentStore for MemoryAttachmentStore {
    async fn store(&self, ref_id: &str, bytes: &[u8], media_type: &str) -> Result<String> {
        self.blobs
            .lock()
            .expect("attachment store lock poisoned")
            .insert(ref_id.to_string(), (bytes.to_vec(), media_type.to_string()));
        Ok(format!("memory://{ref_id}"))
    }
}
