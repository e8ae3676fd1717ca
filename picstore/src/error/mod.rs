//! Error types and HTTP error mapping

use crate::name::NameError;
use crate::storage::StorageError;
use axum::extract::multipart::MultipartError;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the HTTP layer
#[derive(Debug, Error)]
pub enum ApiError {
    /// Requested name is not acceptable
    #[error("Invalid image name: {0}")]
    InvalidName(#[from] NameError),

    /// Upload carried no image bytes
    #[error("Upload is empty")]
    EmptyBody,

    /// Request body is malformed for its content type
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Content type the upload endpoint does not handle
    #[error("Unsupported content type: {0}")]
    UnsupportedMediaType(String),

    /// Request body is larger than the configured limit
    #[error("Upload exceeds the configured size limit")]
    PayloadTooLarge,

    /// Remote image could not be fetched
    #[error("Failed to fetch remote image: {0}")]
    Fetch(String),

    /// Storage operation failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// HTTP status for this error
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidName(_) | Self::EmptyBody | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Fetch(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(err) if err.is_content_error() => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A streamed upload body grew past the configured limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Body exceeds the limit of {limit} bytes")]
pub struct BodyLimitExceeded {
    /// Configured limit in bytes
    pub limit: usize,
}

impl ApiError {
    /// Classifies a failed append, recovering upload transport errors that
    /// surfaced as I/O errors while the body was streamed into storage
    #[must_use]
    pub fn from_upload(err: StorageError) -> Self {
        if let StorageError::Io(io) = &err {
            if let Some(inner) = io.get_ref() {
                if let Some(multipart) = inner.downcast_ref::<MultipartError>() {
                    return if multipart.status() == StatusCode::PAYLOAD_TOO_LARGE {
                        Self::PayloadTooLarge
                    } else {
                        Self::BadRequest(multipart.body_text())
                    };
                }
                if inner.is::<BodyLimitExceeded>() {
                    return Self::PayloadTooLarge;
                }
                if let Some(fetch) = inner.downcast_ref::<reqwest::Error>() {
                    return Self::Fetch(fetch.to_string());
                }
            }
        }
        Self::Storage(err)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Fetch(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() && status != StatusCode::BAD_GATEWAY {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::from(NameError::Empty).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::EmptyBody.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::UnsupportedMediaType("text/plain".into()).status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(ApiError::PayloadTooLarge.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(ApiError::Fetch("404".into()).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            ApiError::from(StorageError::Degenerate { width: 0, height: 0 }).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::from(StorageError::Cancelled).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_server_errors_hide_details() {
        let err = ApiError::from(StorageError::from(std::io::Error::other("/srv/secret path")));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_from_upload_keeps_storage_errors() {
        let err = ApiError::from_upload(StorageError::from(std::io::Error::other("disk full")));
        assert!(matches!(err, ApiError::Storage(StorageError::Io(_))));

        let err = ApiError::from_upload(StorageError::Cancelled);
        assert!(matches!(err, ApiError::Storage(StorageError::Cancelled)));
    }

    #[test]
    fn test_from_upload_detects_body_limit() {
        let io = std::io::Error::other(BodyLimitExceeded { limit: 1024 });
        let err = ApiError::from_upload(StorageError::Io(io));
        assert!(matches!(err, ApiError::PayloadTooLarge));
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_client_error_message() {
        let err = ApiError::from(NameError::Empty);
        assert_eq!(err.to_string(), "Invalid image name: Image name can't be empty");
    }
}
