//! Core rate limiter implementation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, trace, warn};

use super::backend::{DurableStore, RateLimiterBackend};
use super::durable::check_durable;
use super::local::LocalCounters;
use super::policy::Policy;
use super::window::normalize_identifier;

/// Outcome of one rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// Whether the request exceeds the quota of its window
    pub limited: bool,
    /// Seconds until the window resets, at least 1
    #[serde(rename = "retry_after_seconds")]
    pub retry_after_secs: u64,
}

/// Source of the current time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    /// Create a clock stopped at `now_ms`.
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    /// Move the clock to `now_ms`.
    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    /// Move the clock forward by `by_ms`.
    pub fn advance(&self, by_ms: u64) {
        self.now_ms.fetch_add(by_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// The rate limiter that chains the durable and in-process strategies.
///
/// Checks go to the durable store when one is available. If the store
/// fails, that single check is counted in-process instead and the failure
/// is only logged; callers never see an error.
pub struct RateLimiter {
    /// Fallback counters owned by this limiter
    local: LocalCounters,
    /// Durable store used by `check_limit`
    store: RwLock<Option<Arc<dyn DurableStore>>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create an in-process rate limiter using the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an in-process rate limiter with a custom clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            local: LocalCounters::new(),
            store: RwLock::new(None),
            clock,
        }
    }

    /// Create a rate limiter that prefers the given durable store.
    pub fn with_store(store: Arc<dyn DurableStore>, clock: Arc<dyn Clock>) -> Self {
        let limiter = Self::with_clock(clock);
        limiter.set_store(Some(store));
        limiter
    }

    /// Replace the durable store used by `check_limit`.
    pub fn set_store(&self, store: Option<Arc<dyn DurableStore>>) {
        *self.store.write() = store;
    }

    /// Whether a durable store is configured.
    pub fn has_store(&self) -> bool {
        self.store.read().is_some()
    }

    /// Check the rate limit using the configured store, if any.
    pub async fn check_limit(&self, identifier: &str, policy: &Policy) -> Decision {
        let store = self.store.read().clone();
        self.check_limit_with(identifier, policy, store.as_deref()).await
    }

    /// Check the rate limit against an explicitly chosen store.
    ///
    /// `None` counts in-process only.
    pub async fn check_limit_with(
        &self,
        identifier: &str,
        policy: &Policy,
        store: Option<&dyn DurableStore>,
    ) -> Decision {
        let identifier = normalize_identifier(identifier);
        let now_ms = self.clock.now_ms();

        trace!(
            key_prefix = %policy.key_prefix(),
            identifier = %identifier,
            durable = store.is_some(),
            "Checking rate limit"
        );

        let decision = match store {
            Some(store) => match check_durable(store, policy, identifier, now_ms).await {
                Ok(decision) => decision,
                Err(e) => {
                    warn!(
                        error = %e,
                        key_prefix = %policy.key_prefix(),
                        "Durable store failed, counting in-process"
                    );
                    self.local.check(policy, identifier, now_ms)
                }
            },
            None => self.local.check(policy, identifier, now_ms),
        };

        if decision.limited {
            debug!(
                key_prefix = %policy.key_prefix(),
                identifier = %identifier,
                retry_after_secs = decision.retry_after_secs,
                "Rate limit exceeded"
            );
        }

        decision
    }

    /// The in-process fallback counters.
    pub fn local(&self) -> &LocalCounters {
        &self.local
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateLimiterBackend for RateLimiter {
    async fn check_limit(&self, identifier: &str, policy: &Policy) -> Decision {
        RateLimiter::check_limit(self, identifier, policy).await
    }
}
