use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use turnstile::config::TurnstileConfig;
use turnstile::http::HttpServer;
use turnstile::ratelimit::{PolicyRegistry, RateLimiter, RedisStore};

/// Fixed-window rate limiting service for edge functions.
#[derive(Parser, Debug)]
#[command(name = "turnstile", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "TURNSTILE_CONFIG")]
    config: Option<String>,

    /// Address for the HTTP check service
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Redis URL for the durable counter store
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Deployment tier used to namespace counter keys
    #[arg(long, env = "DEPLOY_TIER")]
    tier: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match args.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .init(),
    }

    info!("Starting Turnstile Rate Limiting Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = TurnstileConfig::load(args.config.as_deref())?;
    config.apply_overrides(args.listen, args.redis_url, args.tier);
    info!(http_addr = %config.server.http_addr, "Configuration loaded");

    let policies = Arc::new(PolicyRegistry::resolve(
        &config.rate_limiting.policies,
        config.rate_limiting.deploy_tier.as_deref(),
        |name| std::env::var(name).ok(),
    ));

    // The store connects on first use; until then checks count in-process
    let rate_limiter = Arc::new(RateLimiter::new());
    match config.store.redis_url.as_deref() {
        Some(url) => match RedisStore::new(url) {
            Ok(store) => rate_limiter.set_store(Some(Arc::new(store))),
            Err(e) => warn!(error = %e, "Invalid durable store URL, counting in-process"),
        },
        None => info!("No durable store configured, counting in-process"),
    }
    info!(durable = rate_limiter.has_store(), "Rate limiter initialized");

    let server = HttpServer::new(config.server.http_addr, rate_limiter, policies);
    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Turnstile Rate Limiting Service stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
