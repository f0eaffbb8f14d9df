//! Rate limiting logic and state management.

mod backend;
mod durable;
mod limiter;
mod local;
mod policy;
mod redis_store;
mod window;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{DurableStore, RateLimiterBackend, StoreError};
pub use durable::{check_durable, parse_count, EXPIRY_GRACE_SECS};
pub use limiter::{Clock, Decision, ManualClock, RateLimiter, SystemClock};
pub use local::{CounterEntry, LocalCounters, SWEEP_INTERVAL};
pub use policy::{
    deploy_tier, parse_bounded_int, Policy, PolicyRegistry, PolicyTemplate, DEFAULT_TIER,
    MAX_MAX_REQUESTS, MAX_WINDOW_MS, MIN_MAX_REQUESTS, MIN_WINDOW_MS,
};
pub use redis_store::RedisStore;
pub use window::{normalize_identifier, retry_after_secs, FixedWindow, WindowKey, UNKNOWN_IDENTIFIER};
