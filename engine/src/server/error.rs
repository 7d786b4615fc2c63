//! HTTP error mapping
//!
//! Every failure leaves the server as `{ "error": ..., "details": ... }` with
//! a status chosen from the [`EngineError`] variant. Server-side failures
//! carry the user hint as `error`; only the already scrubbed provider
//! diagnostic is exposed in `details`.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sdk::errors::{EngineError, EngineErrorExt};
use serde::Serialize;

/// Error body returned by every endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// An [`EngineError`] on its way to the client
#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            EngineError::Validation(_) | EngineError::ModerationRejected(_) => {
                StatusCode::BAD_REQUEST
            }
            EngineError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            EngineError::ModerationUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::AllProvidersExhausted { .. }
            | EngineError::Config(_)
            | EngineError::Export(_)
            | EngineError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        match &self.0 {
            EngineError::Validation(message) => ErrorBody {
                error: message.clone(),
                details: None,
            },
            EngineError::ModerationRejected(_) => ErrorBody {
                error: self.0.user_hint().to_string(),
                details: None,
            },
            EngineError::RateLimitExceeded { limit, window, .. } => ErrorBody {
                error: self.0.user_hint().to_string(),
                details: Some(format!("limit is {} requests per {}", limit, window)),
            },
            EngineError::AllProvidersExhausted { detail, .. } => ErrorBody {
                error: self.0.user_hint().to_string(),
                details: Some(detail.clone()),
            },
            _ => ErrorBody {
                error: self.0.user_hint().to_string(),
                details: None,
            },
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        Self(error)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(EngineError::validation(rejection.body_text()))
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self(EngineError::validation(rejection.body_text()))
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        Self(EngineError::validation(format!("Invalid upload: {}", error)))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.0.is_client_error() {
            tracing::debug!(status = status.as_u16(), "{}", self.0);
        } else {
            tracing::error!(
                status = status.as_u16(),
                recoverable = self.0.is_recoverable(),
                "{}",
                self.0
            );
        }
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (EngineError::validation("x"), StatusCode::BAD_REQUEST),
            (
                EngineError::ModerationRejected("x".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                EngineError::ModerationUnavailable("x".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                EngineError::RateLimitExceeded {
                    src: "a".to_string(),
                    count: 1,
                    limit: 1,
                    window: "60 seconds".to_string(),
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                EngineError::Export("zip".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.is_client_error(), status.is_client_error());
            assert_eq!(ApiError(error).status_code(), status);
        }
    }

    #[test]
    fn test_exhausted_body_carries_detail() {
        let body = ApiError(EngineError::AllProvidersExhausted {
            operation: "simulate".to_string(),
            detail: "tried openai; last error: upstream returned 503".to_string(),
        })
        .body();
        assert!(body.error.contains("unavailable"));
        assert_eq!(
            body.details.as_deref(),
            Some("tried openai; last error: upstream returned 503")
        );
    }

    #[test]
    fn test_validation_body_is_the_message() {
        let body = ApiError(EngineError::validation("invention is required")).body();
        assert_eq!(body.error, "invention is required");
        assert_eq!(body.details, None);
    }
}
