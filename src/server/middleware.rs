use super::AppState;
use super::error::ApiError;
use crate::rate_limiter::{Admission, client_key};
use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http_body_util::Limited;
use std::net::SocketAddr;
use tracing::warn;

const HEALTH_PATH: &str = "/health";
pub(crate) const TOKEN_PATH: &str = "/bridge-token";

/// Health is always public; the token route only when it is mounted.
fn is_public(path: &str, expose_token_endpoint: bool) -> bool {
    path == HEALTH_PATH || (expose_token_endpoint && path == TOKEN_PATH)
}

/// Reject declared oversized bodies up front and cap streamed ones while
/// they are read.
pub(crate) async fn limit_body(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let limit = state.settings().body_limit_bytes;
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());
    if declared.is_some_and(|length| length > u64::try_from(limit).unwrap_or(u64::MAX)) {
        warn!(declared, limit, "request body over limit");
        return ApiError::PayloadTooLarge.into_response();
    }

    let request = request.map(|body| Body::new(Limited::new(body, limit)));
    next.run(request).await
}

pub(crate) async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(
        request.headers(),
        peer,
        state.settings().trust_forwarded_for,
    );

    match state.limiter().admit(&key) {
        Admission::Allowed => next.run(request).await,
        Admission::Throttled => {
            warn!(client = %key, "rate limit exceeded");
            ApiError::RateLimited.into_response()
        }
    }
}

pub(crate) async fn authenticate(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if is_public(request.uri().path(), state.settings().expose_token_endpoint) {
        return next.run(request).await;
    }

    let credential = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let presented = credential.is_some();
    if state.token().authorizes(credential) {
        return next.run(request).await;
    }

    warn!(
        method = %request.method(),
        path = %request.uri().path(),
        presented,
        "rejected unauthenticated request"
    );
    ApiError::Unauthorized.into_response()
}
