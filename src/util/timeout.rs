//! Hop deadline helper.

use std::future::Future;
use std::time::Duration;

use crate::error::MasError;

/// Wrap a hop dispatch with its deadline.
///
/// An elapsed timer maps to [`MasError::HopTimeout`] carrying the
/// recipient name, so the coordinator's retry path can report which oxy
/// missed the deadline.
pub async fn with_hop_timeout<T>(
    recipient: &str,
    duration: Duration,
    future: impl Future<Output = Result<T, MasError>>,
) -> Result<T, MasError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(MasError::HopTimeout {
            recipient: recipient.to_string(),
            timeout_ms: duration.as_millis() as u64,
        }),
    }
}
