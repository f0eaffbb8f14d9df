//! Configuration management for Turnstile.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;

use crate::error::{Result, TurnstileError};
use crate::ratelimit::PolicyTemplate;

/// Prefix of environment variables read by [`TurnstileConfig::load`].
pub const ENV_PREFIX: &str = "TURNSTILE";

/// Main configuration for the Turnstile service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnstileConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Durable store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8787))
}

/// Durable store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Redis URL; counters stay in-process when unset
    #[serde(default)]
    pub redis_url: Option<String>,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Deployment tier appended to every key prefix
    #[serde(default)]
    pub deploy_tier: Option<String>,

    /// Named policy templates
    #[serde(default = "default_policies")]
    pub policies: HashMap<String, PolicyTemplate>,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            deploy_tier: None,
            policies: default_policies(),
        }
    }
}

fn default_policies() -> HashMap<String, PolicyTemplate> {
    let mut policies = HashMap::new();
    policies.insert(
        "registration".to_string(),
        PolicyTemplate {
            base_prefix: "register".to_string(),
            window_ms: 600_000,
            max: 5,
            window_ms_env: Some("REGISTRATION_RATE_LIMIT_WINDOW_MS".to_string()),
            max_env: Some("REGISTRATION_RATE_LIMIT_MAX".to_string()),
        },
    );
    policies.insert(
        "content".to_string(),
        PolicyTemplate {
            base_prefix: "content".to_string(),
            window_ms: 60_000,
            max: 60,
            window_ms_env: Some("CONTENT_RATE_LIMIT_WINDOW_MS".to_string()),
            max_env: Some("CONTENT_RATE_LIMIT_MAX".to_string()),
        },
    );
    policies
}

impl TurnstileConfig {
    /// Load configuration from a YAML file path.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| TurnstileError::Config(e.to_string()))
    }

    /// Load configuration from an optional file layered under
    /// `TURNSTILE__SECTION__KEY` environment variables.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );

        builder
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(|e| TurnstileError::Config(e.to_string()))
    }

    /// Apply command-line values, which take precedence over file and
    /// environment settings.
    pub fn apply_overrides(
        &mut self,
        http_addr: Option<SocketAddr>,
        redis_url: Option<String>,
        deploy_tier: Option<String>,
    ) {
        if let Some(http_addr) = http_addr {
            self.server.http_addr = http_addr;
        }
        if redis_url.is_some() {
            self.store.redis_url = redis_url;
        }
        if deploy_tier.is_some() {
            self.rate_limiting.deploy_tier = deploy_tier;
        }
    }
}
