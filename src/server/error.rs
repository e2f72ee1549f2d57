use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use sandgate_commons::ErrorBody;
use thiserror::Error;

/// Headers attached to every response, including rejections raised by
/// outer middleware.
pub fn security_headers() -> [(HeaderName, HeaderValue); 2] {
    [
        (
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ),
        (header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
    ]
}

/// Every failure the HTTP surface can report. The message is all the caller
/// sees; details stay in the logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Too many requests")]
    RateLimited,
    #[error("Path outside sandbox")]
    OutsideSandbox,
    #[error("{0}")]
    Validation(&'static str),
    #[error("Command blocked by security policy")]
    CommandBlocked,
    #[error("Payload too large")]
    PayloadTooLarge,
    #[error("Origin not allowed")]
    ForbiddenOrigin,
    #[error("{0}")]
    OperationFailed(&'static str),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::OutsideSandbox | Self::CommandBlocked | Self::ForbiddenOrigin => {
                StatusCode::FORBIDDEN
            }
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::OperationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), security_headers(), Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            tracing::debug!(error = %rejection.body_text(), "rejected request body");
            Self::Validation("Invalid JSON body")
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "rejected query string");
        Self::Validation("Invalid query string")
    }
}
