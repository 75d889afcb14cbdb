//! Shared utilities.

pub mod retry;
pub mod timeout;

pub use retry::RetryPolicy;
pub use timeout::with_hop_timeout;
