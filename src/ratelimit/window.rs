//! Fixed time windows and the keys that address them.

/// Identifier used when a caller cannot be identified.
pub const UNKNOWN_IDENTIFIER: &str = "unknown";

/// An epoch-aligned window of fixed length.
///
/// Two instants share a window iff `floor(now / window_ms)` is equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedWindow {
    /// Window number since the epoch
    pub index: u64,
    /// Millisecond timestamp at which the next window starts
    pub reset_at_ms: u64,
    /// Whole seconds until `reset_at_ms`, never below 1
    pub retry_after_secs: u64,
}

impl FixedWindow {
    /// Locate the window containing `now_ms`.
    pub fn at(now_ms: u64, window_ms: u64) -> Self {
        let window_ms = window_ms.max(1);
        let index = now_ms / window_ms;
        let reset_at_ms = (index + 1) * window_ms;

        Self {
            index,
            reset_at_ms,
            retry_after_secs: retry_after_secs(reset_at_ms, now_ms),
        }
    }
}

/// Seconds a caller should wait before retrying, rounded up.
///
/// Returns at least 1 even when the window closes within the current
/// millisecond or has already closed.
pub fn retry_after_secs(reset_at_ms: u64, now_ms: u64) -> u64 {
    let remaining_ms = reset_at_ms.saturating_sub(now_ms);
    remaining_ms.div_ceil(1000).max(1)
}

/// Map empty identifiers onto the shared `"unknown"` bucket.
pub fn normalize_identifier(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        UNKNOWN_IDENTIFIER
    } else {
        trimmed
    }
}

/// A key that uniquely identifies one counter in the durable store.
///
/// Rendered as `prefix:identifier:index`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowKey {
    /// Policy key prefix (already tier-qualified)
    pub prefix: String,
    /// Normalized client identifier
    pub identifier: String,
    /// Window number
    pub index: u64,
}

impl WindowKey {
    /// Create a new window key.
    pub fn new(prefix: &str, identifier: &str, index: u64) -> Self {
        Self {
            prefix: prefix.to_string(),
            identifier: normalize_identifier(identifier).to_string(),
            index,
        }
    }

    /// Convert the window key to its store representation.
    pub fn to_store_key(&self) -> String {
        format!("{}:{}:{}", self.prefix, self.identifier, self.index)
    }
}

impl std::fmt::Display for WindowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_store_key())
    }
}
