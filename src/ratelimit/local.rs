//! In-process fallback counters.

use std::collections::HashMap;

use dashmap::DashMap;
use tracing::debug;

use super::limiter::Decision;
use super::policy::Policy;
use super::window::{normalize_identifier, retry_after_secs};

/// Expired entries are swept on every this-many-th call per prefix.
pub const SWEEP_INTERVAL: u64 = 100;

/// A counter for one identifier within one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterEntry {
    /// Requests seen in the current window
    pub count: u64,
    /// When the current window ends
    pub reset_at_ms: u64,
}

/// Counters for every identifier under one policy prefix.
#[derive(Debug, Default)]
struct PrefixCounters {
    entries: HashMap<String, CounterEntry>,
    calls: u64,
}

impl PrefixCounters {
    fn check(&mut self, policy: &Policy, identifier: &str, now_ms: u64) -> Decision {
        self.calls += 1;
        if self.calls % SWEEP_INTERVAL == 0 {
            self.sweep(now_ms);
        }

        if let Some(entry) = self
            .entries
            .get_mut(identifier)
            .filter(|entry| entry.reset_at_ms > now_ms)
        {
            entry.count += 1;
            return Decision {
                limited: entry.count > policy.max(),
                retry_after_secs: retry_after_secs(entry.reset_at_ms, now_ms),
            };
        }

        // First request of a new window is always admitted
        let reset_at_ms = now_ms + policy.window_ms();
        self.entries.insert(
            identifier.to_string(),
            CounterEntry {
                count: 1,
                reset_at_ms,
            },
        );
        Decision {
            limited: false,
            retry_after_secs: retry_after_secs(reset_at_ms, now_ms),
        }
    }

    fn sweep(&mut self, now_ms: u64) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.reset_at_ms > now_ms);
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed = removed, remaining = self.entries.len(), "Swept expired counters");
        }
    }
}

/// Rate limit counters local to this process.
///
/// Windows here start at the first request of an identifier rather than on
/// epoch boundaries. Nothing is shared with other processes, so each process
/// enforces its own quota.
#[derive(Debug, Default)]
pub struct LocalCounters {
    prefixes: DashMap<String, PrefixCounters>,
}

impl LocalCounters {
    /// Create an empty set of counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request for `identifier` under `policy`.
    pub fn check(&self, policy: &Policy, identifier: &str, now_ms: u64) -> Decision {
        let identifier = normalize_identifier(identifier);
        let mut counters = self
            .prefixes
            .entry(policy.key_prefix().to_string())
            .or_default();
        counters.check(policy, identifier, now_ms)
    }

    /// Current entry for an identifier, if one is tracked.
    pub fn entry(&self, prefix: &str, identifier: &str) -> Option<CounterEntry> {
        self.prefixes
            .get(prefix)
            .and_then(|counters| counters.entries.get(normalize_identifier(identifier)).copied())
    }

    /// Number of identifiers tracked under a prefix.
    pub fn len(&self, prefix: &str) -> usize {
        self.prefixes
            .get(prefix)
            .map(|counters| counters.entries.len())
            .unwrap_or(0)
    }

    /// Whether no identifier is tracked under any prefix.
    pub fn is_empty(&self) -> bool {
        self.prefixes.iter().all(|counters| counters.entries.is_empty())
    }

    /// Drop every counter.
    pub fn clear(&self) {
        self.prefixes.clear();
    }
}
