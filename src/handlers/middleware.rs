use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota,
};
use std::{num::NonZeroU32, sync::Arc, time::Duration};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, warn};

use super::api::{error_response, ApiError};
use crate::config::RateLimitConfig;
use crate::observability::{client_ip, Metrics, AUTHENTICATED_USER_HEADER};

/// Number of tracked clients above which idle entries are pruned
const PRUNE_THRESHOLD: usize = 10_000;

/// Reject bodies that are not JSON (415) or larger than `max_request_size` (413)
pub async fn request_validation_middleware(
    State(max_request_size): State<usize>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    validate_content_type(&request)?;
    validate_request_size(request.headers(), max_request_size)?;

    Ok(next.run(request).await)
}

fn has_body(headers: &HeaderMap) -> bool {
    let content_length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());

    match content_length {
        Some(length) => length > 0,
        None => headers.contains_key(header::TRANSFER_ENCODING),
    }
}

/// Bodiless POST and DELETE requests (order creation, cart clearing) need no content type
fn validate_content_type(request: &Request<Body>) -> Result<(), ApiError> {
    let method = request.method();
    if method != Method::POST && method != Method::PUT && method != Method::PATCH {
        return Ok(());
    }

    let headers = request.headers();
    match headers.get(header::CONTENT_TYPE) {
        Some(content_type) => {
            let content_type = content_type.to_str().unwrap_or("");
            if content_type.starts_with("application/json") {
                Ok(())
            } else {
                warn!("Invalid content type: {}", content_type);
                Err(error_response(
                    StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    "Content-Type must be application/json",
                ))
            }
        }
        None if has_body(headers) => {
            warn!("Request body without content type");
            Err(error_response(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "Content-Type must be application/json",
            ))
        }
        None => Ok(()),
    }
}

fn validate_request_size(headers: &HeaderMap, max_request_size: usize) -> Result<(), ApiError> {
    let length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());

    match length {
        Some(length) if length > max_request_size as u64 => {
            error!("Request too large: {} bytes", length);
            Err(error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!(
                    "Request size {} bytes exceeds maximum of {} bytes",
                    length, max_request_size
                ),
            ))
        }
        _ => Ok(()),
    }
}

/// Cross-origin access for browser clients, including the identity header
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(AUTHENTICATED_USER_HEADER),
        ])
        .max_age(Duration::from_secs(86400))
}

/// Keyed GCRA limiter: each client may burst `requests_per_window` requests,
/// refilled evenly over the window
pub struct RateLimiter {
    limiter: Option<DefaultKeyedRateLimiter<String>>,
    clock: DefaultClock,
    metrics: Arc<Metrics>,
}

fn quota(config: &RateLimitConfig) -> Option<Quota> {
    let burst = NonZeroU32::new(config.requests_per_window)?;
    let period = config.window() / config.requests_per_window;
    Quota::with_period(period).map(|quota| quota.allow_burst(burst))
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, metrics: Arc<Metrics>) -> Self {
        let limiter = if config.enabled {
            let quota = quota(&config);
            if quota.is_none() {
                warn!(?config, "Rate limit quota is empty; throttling disabled");
            }
            quota.map(DefaultKeyedRateLimiter::<String>::keyed)
        } else {
            None
        };

        Self {
            limiter,
            clock: DefaultClock::default(),
            metrics,
        }
    }

    /// Count one request for `key`; on rejection returns how long until the next one is allowed
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };

        if limiter.len() > PRUNE_THRESHOLD {
            limiter.retain_recent();
        }

        let key = key.to_string();
        limiter
            .check_key(&key)
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }
}

fn client_key(headers: &HeaderMap) -> (String, &'static str) {
    let user = headers
        .get(AUTHENTICATED_USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    match user {
        Some(user) => (format!("user:{}", user), "user"),
        None => (
            format!("ip:{}", client_ip(headers).unwrap_or_else(|| "unknown".to_string())),
            "ip",
        ),
    }
}

/// Answer 429 with `Retry-After` once a client exhausts its window
pub async fn rate_limiting_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (key, client_kind) = client_key(request.headers());

    match limiter.check(&key) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            warn!(client = %key, "Rate limit exceeded");
            limiter.metrics.record_throttled_request(client_kind);

            let retry_after_secs = retry_after.as_secs().max(1);
            let mut response = error_response(
                StatusCode::TOO_MANY_REQUESTS,
                format!(
                    "Request was throttled. Expected available in {} seconds.",
                    retry_after_secs
                ),
            )
            .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
            response
        }
    }
}

pub async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'"),
    );

    response
}
