//! Rate limit policies and their construction from configuration.
//!
//! A policy is resolved once from a template, the deployment tier and any
//! environment overrides. Override values are parsed defensively: anything
//! unparsable or out of range silently falls back to the template default.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Smallest accepted window length.
pub const MIN_WINDOW_MS: u64 = 60_000;
/// Largest accepted window length.
pub const MAX_WINDOW_MS: u64 = 3_600_000;
/// Smallest accepted request ceiling.
pub const MIN_MAX_REQUESTS: u64 = 1;
/// Largest accepted request ceiling.
pub const MAX_MAX_REQUESTS: u64 = 1000;

/// Tier used when no deployment tier is configured.
pub const DEFAULT_TIER: &str = "production";

/// A resolved, immutable rate limit policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    window_ms: u64,
    max: u64,
    key_prefix: String,
}

impl Policy {
    /// Create a policy, clamping the numbers into the global safe bounds.
    pub fn new(window_ms: u64, max: u64, key_prefix: impl Into<String>) -> Self {
        Self {
            window_ms: window_ms.clamp(MIN_WINDOW_MS, MAX_WINDOW_MS),
            max: max.clamp(MIN_MAX_REQUESTS, MAX_MAX_REQUESTS),
            key_prefix: key_prefix.into(),
        }
    }

    /// Window length in milliseconds.
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Requests admitted per window.
    pub fn max(&self) -> u64 {
        self.max
    }

    /// Prefix for every counter key of this policy.
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }
}

/// Parse an optional integer, falling back when it is missing, malformed
/// or outside `min..=max`.
pub fn parse_bounded_int(raw: Option<&str>, fallback: u64, min: u64, max: u64) -> u64 {
    let Some(raw) = raw else {
        return fallback;
    };

    match raw.trim().parse::<i64>() {
        Ok(value) if value >= 0 && (min..=max).contains(&(value as u64)) => value as u64,
        _ => fallback,
    }
}

/// Normalize a deployment tier label.
pub fn deploy_tier(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(tier) if !tier.is_empty() => tier.to_lowercase(),
        _ => DEFAULT_TIER.to_string(),
    }
}

/// Defaults for one named policy plus the environment variables that may
/// override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyTemplate {
    /// Base key prefix; the tier is appended to it
    pub base_prefix: String,
    /// Default window length in milliseconds
    pub window_ms: u64,
    /// Default request ceiling
    pub max: u64,
    /// Variable overriding `window_ms`
    #[serde(default)]
    pub window_ms_env: Option<String>,
    /// Variable overriding `max`
    #[serde(default)]
    pub max_env: Option<String>,
}

impl PolicyTemplate {
    /// Resolve this template for a tier, reading overrides through `lookup`.
    pub fn resolve<F>(&self, tier: &str, lookup: F) -> Policy
    where
        F: Fn(&str) -> Option<String>,
    {
        let window_raw = self.window_ms_env.as_deref().and_then(&lookup);
        let max_raw = self.max_env.as_deref().and_then(&lookup);

        let window_ms = parse_bounded_int(
            window_raw.as_deref(),
            self.window_ms,
            MIN_WINDOW_MS,
            MAX_WINDOW_MS,
        );
        let max = parse_bounded_int(
            max_raw.as_deref(),
            self.max,
            MIN_MAX_REQUESTS,
            MAX_MAX_REQUESTS,
        );

        Policy::new(window_ms, max, format!("{}:{}", self.base_prefix, tier))
    }
}

/// Named policies resolved for one deployment tier.
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    tier: String,
    policies: HashMap<String, Policy>,
}

impl PolicyRegistry {
    /// Resolve every template against the tier and override lookup.
    pub fn resolve<F>(
        templates: &HashMap<String, PolicyTemplate>,
        tier: Option<&str>,
        lookup: F,
    ) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let tier = deploy_tier(tier);
        let policies: HashMap<String, Policy> = templates
            .iter()
            .map(|(name, template)| {
                let policy = template.resolve(&tier, &lookup);
                debug!(
                    policy = %name,
                    key_prefix = %policy.key_prefix(),
                    window_ms = policy.window_ms(),
                    max = policy.max(),
                    "Resolved rate limit policy"
                );
                (name.clone(), policy)
            })
            .collect();

        info!(tier = %tier, count = policies.len(), "Rate limit policies resolved");

        Self { tier, policies }
    }

    /// The deployment tier these policies were resolved for.
    pub fn tier(&self) -> &str {
        &self.tier
    }

    /// Look up a policy by name.
    pub fn get(&self, name: &str) -> Option<&Policy> {
        self.policies.get(name)
    }

    /// Number of registered policies.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether no policy is registered.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
