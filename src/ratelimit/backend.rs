//! Caller-facing rate limiter contract and the durable store contract.

use async_trait::async_trait;
use thiserror::Error;

use super::limiter::Decision;
use super::policy::Policy;

/// Trait for rate limiter implementations.
///
/// This is the only surface callers such as the HTTP service depend on;
/// storage details stay behind it.
#[async_trait]
pub trait RateLimiterBackend: Send + Sync {
    /// Count one request for `identifier` under `policy`.
    async fn check_limit(&self, identifier: &str, policy: &Policy) -> Decision;
}

/// Errors reported by a durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing service rejected or failed the operation.
    #[error("Store backend error: {0}")]
    Backend(String),

    /// The store could not be reached or refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// An external key-value service with per-key expiry.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, expiring it after the given number of
    /// seconds when set.
    async fn put(
        &self,
        key: &str,
        value: &str,
        expire_after_secs: Option<u64>,
    ) -> Result<(), StoreError>;
}
