//! Error types for the mirror handler.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::http::response::error_response;

/// Failures that abort a mirror request. Everything else degrades in place.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The request body could not be buffered (too large or stream failure).
    #[error("failed to read request body: {0}")]
    Body(#[from] BytesRejection),

    /// The report could not be serialized.
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl MirrorError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            MirrorError::Body(rejection) => rejection.status(),
            MirrorError::Serialize(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Never carries internal detail.
    fn public_message(&self) -> &'static str {
        match self {
            MirrorError::Body(_) if self.status_code() == StatusCode::PAYLOAD_TOO_LARGE => {
                "request body too large"
            }
            MirrorError::Body(_) => "failed to read request body",
            MirrorError::Serialize(_) => "internal server error",
        }
    }
}

impl IntoResponse for MirrorError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Mirror request failed");
        } else {
            tracing::debug!(error = %self, "Mirror request rejected");
        }
        error_response(status, self.public_message())
    }
}

/// A form or multipart body that could not be parsed.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("failed to rebuild multipart request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("invalid multipart request: {0}")]
    Rejection(#[from] MultipartRejection),

    #[error("malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),
}
