//! Global request throttling keyed by caller identity.
//!
//! Machine callers are identified by the hash of their API key, everything
//! else by client IP. Rejected requests are still recorded by the limiter,
//! and every response carries the remaining-quota headers.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use service_core::error::AppError;
use std::net::SocketAddr;

use crate::services::{RateDecision, RateLimiter};
use crate::utils::hash_token;

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let connect_info = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let identifier = client_identifier(request.headers(), connect_info);

    let decision = match limiter.check(&identifier).await {
        Ok(decision) => decision,
        Err(e) => return AppError::from(e).into_response(),
    };

    if !decision.allowed {
        let mut response = AppError::TooManyRequests {
            code: "RATE_LIMIT_EXCEEDED",
            message: format!(
                "Rate limit exceeded. Maximum {} requests per minute.",
                decision.limit
            ),
            retry_after: Some(60),
        }
        .into_response();
        set_rate_limit_headers(&mut response, decision);
        return response;
    }

    let mut response = next.run(request).await;
    set_rate_limit_headers(&mut response, decision);
    response
}

fn set_rate_limit_headers(response: &mut Response, decision: RateDecision) {
    response.headers_mut().insert(
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderValue::from(decision.limit),
    );
    response.headers_mut().insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderValue::from(decision.remaining),
    );
}

/// Rate-limit identifier: API-key hash when the header is present, client IP
/// otherwise.
pub fn client_identifier(headers: &HeaderMap, connect_info: Option<SocketAddr>) -> String {
    if let Some(key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        return hash_token(key);
    }
    client_ip(headers, connect_info).unwrap_or_else(|| "unknown".to_string())
}

/// Best-effort client IP: first `x-forwarded-for` entry, falling back to the
/// socket peer address.
pub fn client_ip(headers: &HeaderMap, connect_info: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<std::net::IpAddr>().ok());

    match forwarded {
        Some(ip) => Some(ip.to_string()),
        None => connect_info.map(|addr| addr.ip().to_string()),
    }
}
