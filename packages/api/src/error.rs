use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Request-boundary failure. Every variant renders as `{ "error": "<message>" }`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Body is not a JSON object or lacks the `image` field
    #[error("{0}")]
    InvalidRequest(String),
    /// Payload is not base64 or not a decodable image
    #[error("{0}")]
    InvalidImage(String),
    /// Predicted class has no catalog metadata
    #[error("{0}")]
    MetadataMissing(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) | ApiError::InvalidImage(_) => StatusCode::BAD_REQUEST,
            ApiError::MetadataMissing(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::InvalidImage(_) => "invalid_image",
            ApiError::MetadataMissing(_) => "metadata_missing",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl From<leafdoc_core::Error> for ApiError {
    fn from(err: leafdoc_core::Error) -> Self {
        use leafdoc_core::Error;
        match err {
            Error::InvalidImage(_) => ApiError::InvalidImage(err.to_string()),
            Error::MetadataMissing(_) => ApiError::MetadataMissing(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorBody<'a> {
            error: &'a str,
        }

        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "Prediction failed");
        } else {
            tracing::warn!(kind = self.kind(), error = %self, "Rejected prediction request");
        }

        let message = self.to_string();
        (status, Json(ErrorBody { error: &message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_core_errors_to_status() {
        let invalid: ApiError = leafdoc_core::Error::InvalidImage("bad png".into()).into();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.to_string(), "invalid image: bad png");

        let missing: ApiError = leafdoc_core::Error::MetadataMissing("Rust".into()).into();
        assert_eq!(missing.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let inference: ApiError = leafdoc_core::Error::Inference("boom".into()).into();
        assert!(matches!(inference, ApiError::Internal(_)));
        assert_eq!(inference.to_string(), "inference failed: boom");
    }

    #[test]
    fn invalid_request_is_a_client_error() {
        let err = ApiError::InvalidRequest("No image provided".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.kind(), "invalid_request");
    }
}
