//! Fixed-window counting against a durable key-value store.
//!
//! Each check reads the window's counter and writes back the incremented
//! value. The read and the write are separate round trips without a
//! transaction, so concurrent checks for one identifier can both observe
//! the same count and under-count by up to `concurrency - 1`.

use tracing::trace;

use super::backend::{DurableStore, StoreError};
use super::limiter::Decision;
use super::policy::Policy;
use super::window::{FixedWindow, WindowKey};

/// Seconds a stored counter outlives the window it describes.
pub const EXPIRY_GRACE_SECS: u64 = 60;

/// Parse a stored counter. Missing, malformed and negative values count as
/// zero.
pub fn parse_count(raw: Option<&str>) -> u64 {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .filter(|count| *count >= 0)
        .map(|count| count as u64)
        .unwrap_or(0)
}

/// Count one request in the durable store.
pub async fn check_durable(
    store: &dyn DurableStore,
    policy: &Policy,
    identifier: &str,
    now_ms: u64,
) -> Result<Decision, StoreError> {
    let window = FixedWindow::at(now_ms, policy.window_ms());
    let key = WindowKey::new(policy.key_prefix(), identifier, window.index).to_store_key();

    let current = parse_count(store.get(&key).await?.as_deref());
    let count = current + 1;

    store
        .put(
            &key,
            &count.to_string(),
            Some(window.retry_after_secs + EXPIRY_GRACE_SECS),
        )
        .await?;

    trace!(
        key = %key,
        count = count,
        max = policy.max(),
        "Durable counter incremented"
    );

    Ok(Decision {
        limited: count > policy.max(),
        retry_after_secs: window.retry_after_secs,
    })
}
