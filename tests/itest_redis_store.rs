//! Redis store tests. Run with a server available:
//!
//! ```text
//! REDIS_URL=redis://127.0.0.1:6379/ cargo test -- --ignored
//! ```

use std::sync::Arc;

use turnstile::ratelimit::{DurableStore, ManualClock, Policy, RateLimiter, RedisStore};

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/".to_string())
}

fn unique_prefix(name: &str) -> String {
    format!(
        "turnstile-itest:{}:{}:{}",
        name,
        std::process::id(),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    )
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_redis_get_put_roundtrip() {
    let store = RedisStore::connect(&redis_url()).await.unwrap();
    let key = unique_prefix("roundtrip");

    assert_eq!(store.get(&key).await.unwrap(), None);
    store.put(&key, "7", Some(30)).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("7"));
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_redis_backed_limiter() {
    let store = Arc::new(RedisStore::connect(&redis_url()).await.unwrap());
    let clock = Arc::new(ManualClock::new(0));
    let limiter = RateLimiter::with_store(store.clone(), clock.clone());
    let policy = Policy::new(60_000, 2, unique_prefix("limiter"));

    let mut results = Vec::new();
    for t in [0, 1_000, 2_000, 61_000] {
        clock.set(t);
        results.push(limiter.check_limit("1.2.3.4", &policy).await.limited);
    }

    assert_eq!(results, vec![false, false, true, false]);
    assert!(limiter.local().is_empty());

    let key = format!("{}:1.2.3.4:0", policy.key_prefix());
    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("3"));
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_redis_connects_on_first_use() {
    let store = RedisStore::new(&redis_url()).unwrap();
    assert!(!store.is_connected());

    let key = unique_prefix("lazy");
    store.put(&key, "1", Some(30)).await.unwrap();

    assert!(store.is_connected());
    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("1"));
}
