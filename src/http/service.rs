//! Rate limit check endpoints.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::ratelimit::{Decision, PolicyRegistry, RateLimiterBackend, UNKNOWN_IDENTIFIER};

/// Shared state of the check service.
pub struct ServiceState<R: RateLimiterBackend> {
    /// The rate limiter instance
    rate_limiter: Arc<R>,
    /// Policies addressable by name
    policies: Arc<PolicyRegistry>,
}

impl<R: RateLimiterBackend> ServiceState<R> {
    pub fn new(rate_limiter: Arc<R>, policies: Arc<PolicyRegistry>) -> Self {
        Self {
            rate_limiter,
            policies,
        }
    }
}

/// Body of a check request.
#[derive(Debug, Default, Deserialize)]
pub struct CheckRequest {
    /// Client identifier; taken from the request headers when absent
    #[serde(default)]
    pub identifier: Option<String>,
}

/// Body of a check response.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckResponse {
    /// Whether the request exceeded its quota
    pub limited: bool,
    /// Seconds until the current window resets
    pub retry_after_seconds: u64,
}

impl From<Decision> for CheckResponse {
    fn from(decision: Decision) -> Self {
        Self {
            limited: decision.limited,
            retry_after_seconds: decision.retry_after_secs,
        }
    }
}

/// Build the router for the check service.
pub fn router<R: RateLimiterBackend + 'static>(state: Arc<ServiceState<R>>) -> Router {
    Router::new()
        .route("/health", get(health::<R>))
        .route("/v1/limits/{policy}/check", post(check_limit::<R>))
        .with_state(state)
}

/// Work out who is calling: explicit identifier first, then the edge
/// provider's client address headers.
pub fn resolve_identifier(explicit: Option<&str>, headers: &HeaderMap) -> String {
    let from_header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    explicit
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| from_header("cf-connecting-ip"))
        .or_else(|| from_header("x-forwarded-for"))
        .unwrap_or_else(|| UNKNOWN_IDENTIFIER.to_string())
}

fn parse_request(body: &[u8]) -> serde_json::Result<CheckRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CheckRequest::default());
    }
    serde_json::from_slice(body)
}

async fn health<R: RateLimiterBackend + 'static>(
    State(state): State<Arc<ServiceState<R>>>,
) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "tier": state.policies.tier() }))
}

/// Count one request against a named policy.
///
/// The JSON body is optional; an empty body identifies the caller by its
/// headers alone. Limited requests are answered with
/// `429 Too Many Requests` and a `Retry-After` header.
#[instrument(skip_all, fields(policy = %policy))]
pub async fn check_limit<R: RateLimiterBackend + 'static>(
    State(state): State<Arc<ServiceState<R>>>,
    Path(policy): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(resolved) = state.policies.get(&policy) else {
        warn!(policy = %policy, "Check requested for unknown policy");
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown policy: {}", policy) })),
        )
            .into_response();
    };

    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(policy = %policy, error = %e, "Malformed check request body");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("invalid request body: {}", e) })),
            )
                .into_response();
        }
    };

    let identifier = resolve_identifier(request.identifier.as_deref(), &headers);
    let decision = state.rate_limiter.check_limit(&identifier, resolved).await;
    let body = Json(CheckResponse::from(decision));

    if decision.limited {
        info!(
            policy = %policy,
            identifier = %identifier,
            retry_after_secs = decision.retry_after_secs,
            "Request rejected"
        );
        let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
        response.headers_mut().insert(
            header::RETRY_AFTER,
            HeaderValue::from(decision.retry_after_secs),
        );
        return response;
    }

    (StatusCode::OK, body).into_response()
}
