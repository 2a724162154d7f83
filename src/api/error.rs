//! HTTP error mapping
//!
//! Every failure leaves the API as `{ "error": <message>, "code": <CODE> }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::{ErrorResponse, Modality};
use crate::services::detection::{DetectionError, DetectionFailure, ValidationError};

#[derive(Debug, Error)]
pub enum ApiError {
    /// Required input absent from the request (400)
    #[error("{0}")]
    NoInput(String),

    /// Artifact rejected by the validator (400)
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Malformed request body (400)
    #[error("{0}")]
    BadRequest(String),

    /// Classification could not produce a verdict (500); the cause is logged, not returned
    #[error("{} detection failed", .0.noun())]
    DetectionFailed(Modality),

    /// No valid session (401)
    #[error("Please log in to view your detection history.")]
    Unauthorized,

    /// Internal server error (500)
    #[error("{0}")]
    Internal(String),
}

impl From<DetectionFailure> for ApiError {
    fn from(failure: DetectionFailure) -> Self {
        match failure.error {
            DetectionError::Validation(v) => ApiError::Validation(v),
            DetectionError::Classification { modality, .. } => ApiError::DetectionFailed(modality),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NoInput(_) | ApiError::Validation(_) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::DetectionFailed(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NoInput(_) => "NO_INPUT",
            ApiError::Validation(v) => v.kind.code(),
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::DetectionFailed(_) => "DETECTION_FAILED",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        });
        (self.status(), body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::detection::ValidationErrorKind;

    #[test]
    fn test_detection_failure_message_hides_cause() {
        let err = ApiError::DetectionFailed(Modality::Image);
        assert_eq!(err.to_string(), "Image detection failed");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_validation_message_is_verbatim() {
        let err = ApiError::Validation(ValidationError {
            kind: ValidationErrorKind::TooLarge,
            message: "File size exceeds 10MB.".to_string(),
        });
        assert_eq!(err.to_string(), "File size exceeds 10MB.");
        assert_eq!(err.code(), "TOO_LARGE");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
