//! HTTP-backed attachment store.

use async_trait::async_trait;

use crate::error::{MasError, Result};
use crate::util::RetryPolicy;

use super::AttachmentStore;

/// Stores attachment bytes via `PUT {base_url}/{ref_id}`.
///
/// Because ref ids are content hashes, a retried or repeated `PUT` writes
/// the same bytes to the same key; transient failures are retried under
/// the configured [`RetryPolicy`].
pub struct HttpAttachmentStore {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpAttachmentStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn url_for(&self, ref_id: &str) -> String {
        format!("{}/{}", self.base_url, ref_id)
    }

    async fn put_once(&self, url: &str, bytes: &[u8], media_type: &str) -> Result<()> {
        let response = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, media_type)
            .body(bytes.to_vec())
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            // Transient; surfaces as a retryable network error.
            response.error_for_status()?;
            Ok(())
        } else if !status.is_success() {
            Err(MasError::Attachment(format!(
                "attachment upload rejected with status {status}"
            )))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AttachmentStore for HttpAttachmentStore {
    async fn store(&self, ref_id: &str, bytes: &[u8], media_type: &str) -> Result<String> {
        let url = self.url_for(ref_id);
        self.retry
            .execute(|| self.put_once(&url, bytes, media_type))
            .await?;
        tracing::debug!(ref_id = %ref_id, url = %url, bytes = bytes.len(), "attachment stored");
        Ok(url)
    }
}
