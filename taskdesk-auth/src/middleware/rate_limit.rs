/// Per-IP request rate limiting for the auth routes
///
/// Every request counts against a fixed one-minute window keyed by client
/// IP. The limit comes from `AUTH_RATE_LIMIT_PER_MINUTE`.
///
/// # Storage
///
/// Redis key: `ratelimit:ip:{ip}`, TTL 60 seconds.
///
/// # Headers
///
/// Response includes rate limit headers:
/// - `X-RateLimit-Limit`: Requests allowed per window
/// - `X-RateLimit-Remaining`: Requests left in the window
/// - `Retry-After`: Seconds to wait (429 responses only)
///
/// When Redis is unreachable the request is let through without headers;
/// the login lockout still applies separately.

use crate::app::AppState;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use taskdesk_shared::{
    auth::middleware::ClientInfo,
    error::ApiError,
    redis::RateLimitDecision,
};

/// Length of the request window in seconds
pub const WINDOW_SECS: u64 = 60;

fn subject(client: &ClientInfo) -> String {
    format!("ip:{}", client.ip_or_unknown())
}

fn apply_headers(headers: &mut HeaderMap, limit: u64, decision: &RateLimitDecision) {
    headers.insert("X-RateLimit-Limit", HeaderValue::from(limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(decision.remaining));
}

/// Rate limiting middleware layer
///
/// # Errors
///
/// - 429 Too Many Requests: Limit exceeded for this IP
pub async fn ip_rate_limit(
    State(state): State<AppState>,
    client: ClientInfo,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let limit = state.config.limits.requests_per_minute;

    let decision = match state.limiter.hit(&subject(&client), limit, WINDOW_SECS).await {
        Ok(decision) => decision,
        Err(e) => {
            tracing::warn!(error = %e, "Rate limiter unavailable, allowing request");
            return Ok(next.run(request).await);
        }
    };

    if !decision.allowed {
        tracing::warn!(ip = %client.ip_or_unknown(), "Request rate limit exceeded");
        return Err(ApiError::RateLimitExceeded {
            retry_after: decision.retry_after,
            message: format!(
                "Rate limit exceeded. Try again in {} seconds",
                decision.retry_after
            ),
        });
    }

    let mut response = next.run(request).await;
    apply_headers(response.headers_mut(), limit, &decision);

    Ok(response)
}
