//! Upload errors and their HTTP mapping.

use crate::error::RasterError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Everything that can go wrong while serving `POST /upload`.
///
/// Each variant maps to exactly one status code; none of them terminates
/// the server.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The body is not valid `multipart/form-data`.
    #[error("Malformed upload: {0}")]
    InvalidUpload(String),

    /// The form did not contain the expected file field.
    #[error("No file provided. Use field name '{0}'")]
    MissingFile(String),

    /// The body exceeded the configured bound.
    #[error("Upload exceeds the {max} byte limit")]
    FileTooLarge { max: usize },

    /// The upload is not a PDF.
    #[error("Uploaded file is not a PDF (starts with {magic:?})")]
    NotAPdf { magic: [u8; 4] },

    /// The PDF could not be opened or its first page rendered.
    #[error("Could not process document: {0}")]
    Unprocessable(String),

    /// Scratch space could not be created, written or read.
    #[error("Temporary file error: {0}")]
    TempFile(#[source] std::io::Error),

    /// The raster engine could not encode the page.
    #[error("Encoding failed: {0}")]
    EncodeFailed(String),

    /// The encoded page could not be written to scratch space.
    #[error("Writing output failed: {0}")]
    WriteFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl UploadError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            UploadError::InvalidUpload(_) | UploadError::MissingFile(_) => StatusCode::BAD_REQUEST,
            UploadError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::NotAPdf { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            UploadError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            UploadError::TempFile(_)
            | UploadError::EncodeFailed(_)
            | UploadError::WriteFailed(_)
            | UploadError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for the JSON body.
    pub fn code(&self) -> &'static str {
        match self {
            UploadError::InvalidUpload(_) => "INVALID_UPLOAD",
            UploadError::MissingFile(_) => "MISSING_FILE",
            UploadError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            UploadError::NotAPdf { .. } => "NOT_A_PDF",
            UploadError::Unprocessable(_) => "UNPROCESSABLE_DOCUMENT",
            UploadError::TempFile(_) => "TEMP_FILE_ERROR",
            UploadError::EncodeFailed(_) => "ENCODE_FAILED",
            UploadError::WriteFailed(_) => "WRITE_FAILED",
            UploadError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Messages built here end up in the response body, so they carry the
/// engine's detail but never a server-side path.
impl From<RasterError> for UploadError {
    fn from(e: RasterError) -> Self {
        match e {
            RasterError::NotAPdf { magic, .. } => UploadError::NotAPdf { magic },
            RasterError::Load { detail, .. } => UploadError::Unprocessable(detail),
            RasterError::FileNotFound { .. } => {
                UploadError::Unprocessable("uploaded document disappeared".into())
            }
            other @ RasterError::Encode { .. } => UploadError::EncodeFailed(other.to_string()),
            RasterError::Write { path, source } => {
                tracing::error!("Writing {} failed: {}", path.display(), source);
                UploadError::WriteFailed(source.kind().to_string())
            }
            other @ (RasterError::EngineUnavailable(_)
            | RasterError::InvalidConfig(_)
            | RasterError::Internal(_)) => UploadError::Internal(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "Upload failed: {}", self);
        } else {
            tracing::warn!(code = self.code(), "Upload rejected: {}", self);
        }

        // Server-side details stay in the log.
        let error = match &self {
            UploadError::TempFile(_) | UploadError::Internal(_) => {
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorResponse { error, code: self.code() })).into_response()
    }
}
