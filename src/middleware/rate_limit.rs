//! Rate limiting middleware

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    constants::rate_limits::{GENERAL_MAX_REQUESTS, GENERAL_WINDOW_SECS},
    error::AppError,
    middleware::auth::AuthenticatedUser,
    services::RateLimitInfo,
    state::AppState,
};

const API_ACTION: &str = "api";

/// User id when authenticated, otherwise the client address
fn client_key(request: &Request) -> String {
    if let Some(user) = request.extensions().get::<AuthenticatedUser>() {
        return format!("user:{}", user.id);
    }

    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .or_else(|| {
            request
                .headers()
                .get("X-Forwarded-For")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split(',').next())
                .map(|s| s.trim().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string());

    format!("ip:{}", ip)
}

fn add_rate_limit_headers(response: &mut Response, info: &RateLimitInfo) {
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(info.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(info.remaining));
    headers.insert("X-RateLimit-Reset", HeaderValue::from(info.reset));
}

/// Rate limiting middleware for general API requests
pub async fn api_rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);

    match state
        .limiter()
        .hit(&key, API_ACTION, GENERAL_WINDOW_SECS, GENERAL_MAX_REQUESTS)
        .await
    {
        Ok(info) if !info.allowed => {
            let mut response = AppError::TooManyRequests {
                retry_after: info.reset.max(1),
            }
            .into_response();
            add_rate_limit_headers(&mut response, &info);
            response
        }
        Ok(info) => {
            let mut response = next.run(request).await;
            add_rate_limit_headers(&mut response, &info);
            response
        }
        Err(e) => {
            // limiter outage must not take the API down
            tracing::error!(error = %e, "Rate limit check failed");
            next.run(request).await
        }
    }
}
