//! Rate limiter behaviour through the public API.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_test::block_on;

use turnstile::ratelimit::{
    DurableStore, ManualClock, Policy, RateLimiter, StoreError, EXPIRY_GRACE_SECS,
};

/// A store that can be switched off mid-test.
#[derive(Default)]
struct FlakyStore {
    entries: Mutex<HashMap<String, String>>,
    down: AtomicBool,
}

impl FlakyStore {
    fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn value(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }
}

#[async_trait]
impl DurableStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("network unreachable".to_string()));
        }
        Ok(self.value(key))
    }

    async fn put(
        &self,
        key: &str,
        value: &str,
        expire_after_secs: Option<u64>,
    ) -> Result<(), StoreError> {
        assert!(expire_after_secs.unwrap_or(0) > EXPIRY_GRACE_SECS);
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[test]
fn test_outage_degrades_to_in_process_counting() {
    let clock = Arc::new(ManualClock::new(0));
    let store = Arc::new(FlakyStore::default());
    let limiter = RateLimiter::with_store(store.clone(), clock.clone());
    let policy = Policy::new(60_000, 2, "register:production");

    let first = block_on(limiter.check_limit("1.2.3.4", &policy));
    assert!(!first.limited);
    assert_eq!(store.value("register:production:1.2.3.4:0").as_deref(), Some("1"));

    // While the store is down the process counts on its own
    store.set_down(true);
    clock.set(1_000);
    let during = block_on(limiter.check_limit("1.2.3.4", &policy));
    assert!(!during.limited);
    assert!(during.retry_after_secs >= 1);
    assert_eq!(limiter.local().len("register:production"), 1);

    // Once back, the durable count continues where it left off
    store.set_down(false);
    clock.set(2_000);
    let after = block_on(limiter.check_limit("1.2.3.4", &policy));
    assert!(!after.limited);
    assert_eq!(store.value("register:production:1.2.3.4:0").as_deref(), Some("2"));

    clock.set(3_000);
    assert!(block_on(limiter.check_limit("1.2.3.4", &policy)).limited);
}

#[test]
fn test_windows_across_boundary_allow_double_burst() {
    let clock = Arc::new(ManualClock::new(59_000));
    let store = Arc::new(FlakyStore::default());
    let limiter = RateLimiter::with_store(store, clock.clone());
    let policy = Policy::new(60_000, 3, "content:production");

    let mut admitted = 0;
    for _ in 0..3 {
        if !block_on(limiter.check_limit("team", &policy)).limited {
            admitted += 1;
        }
    }
    clock.set(60_000);
    for _ in 0..3 {
        if !block_on(limiter.check_limit("team", &policy)).limited {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 6);
}
