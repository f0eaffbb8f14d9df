//! In-memory durable store doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::backend::{DurableStore, StoreError};

/// A map-backed store that records the expiry of every write. It can be
/// marked unreachable to simulate an outage.
#[derive(Default)]
pub struct MapStore {
    entries: Mutex<HashMap<String, (String, Option<u64>)>>,
    unreachable: AtomicBool,
}

impl MapStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    fn check_reachable(&self) -> Result<(), StoreError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), None));
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).map(|(v, _)| v.clone())
    }

    pub fn expiry(&self, key: &str) -> Option<u64> {
        self.entries.lock().get(key).and_then(|(_, ttl)| *ttl)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[async_trait]
impl DurableStore for MapStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_reachable()?;
        Ok(self.value(key))
    }

    async fn put(
        &self,
        key: &str,
        value: &str,
        expire_after_secs: Option<u64>,
    ) -> Result<(), StoreError> {
        self.check_reachable()?;
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), expire_after_secs));
        Ok(())
    }
}

/// Which operation of [`FailingStore`] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Get,
    Put,
}

/// A store that errors on one of its operations and counts the attempts.
pub struct FailingStore {
    fail_on: FailOn,
    calls: AtomicUsize,
}

impl FailingStore {
    pub fn new(fail_on: FailOn) -> Self {
        Self {
            fail_on,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DurableStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.fail_on {
            FailOn::Get => Err(StoreError::Unavailable("connection refused".to_string())),
            FailOn::Put => Ok(None),
        }
    }

    async fn put(
        &self,
        _key: &str,
        _value: &str,
        _expire_after_secs: Option<u64>,
    ) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.fail_on {
            FailOn::Put => Err(StoreError::Unavailable("write timed out".to_string())),
            FailOn::Get => Ok(()),
        }
    }
}
