//! Error handling for the API server

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use folio::{DataError, FileSystemError, FolioError, SourceError, TemplateError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Folio(#[from] FolioError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Config(_) | ApiError::Internal(_) | ApiError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Folio(e) => folio_status(e),
        }
    }
}

fn folio_status(error: &FolioError) -> StatusCode {
    match error {
        FolioError::Source(e) => match e {
            SourceError::DirectoryNotFound { .. } | SourceError::Empty { .. } => {
                StatusCode::NOT_FOUND
            }
            SourceError::InvalidPath { .. } => StatusCode::BAD_REQUEST,
            SourceError::RemoteStatus { .. }
            | SourceError::Request { .. }
            | SourceError::InvalidListing { .. } => StatusCode::BAD_GATEWAY,
        },
        FolioError::Notebook(_) | FolioError::Export(_) => StatusCode::UNPROCESSABLE_ENTITY,
        FolioError::Template(e) => match e {
            TemplateError::NotFound { .. } => StatusCode::NOT_FOUND,
            TemplateError::Render { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        },
        FolioError::FileSystem(FileSystemError::NotFound { .. }) => StatusCode::NOT_FOUND,
        FolioError::FileSystem(_) => StatusCode::INTERNAL_SERVER_ERROR,
        FolioError::Data(DataError::InvalidJson { .. } | DataError::InvalidFormat { .. }) => {
            StatusCode::BAD_REQUEST
        }
        FolioError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match &self {
            ApiError::Config(_) => "Configuration error".to_string(),
            ApiError::Internal(_) | ApiError::Io(_) => "Internal server error".to_string(),
            ApiError::Folio(e) => e.user_message(),
            _ => self.to_string(),
        };

        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let mut body = json!({
            "error": error_message,
            "status": status.as_u16()
        });
        if let ApiError::Folio(e) = &self {
            let suggestions = e.suggestions();
            if !suggestions.is_empty() {
                body["suggestions"] = json!(suggestions);
            }
        }

        (status, Json(body)).into_response()
    }
}

// Convenience functions for common errors
impl ApiError {
    pub fn bad_request(msg: &str) -> Self {
        Self::BadRequest(msg.to_string())
    }

    pub fn internal(msg: &str) -> Self {
        Self::Internal(msg.to_string())
    }

    pub fn validation(msg: &str) -> Self {
        Self::Validation(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(error: impl Into<FolioError>) -> StatusCode {
        ApiError::from(error.into()).status()
    }

    #[test]
    fn folio_errors_map_to_http_statuses() {
        assert_eq!(
            status_of(TemplateError::NotFound { name: "x.j2".to_string() }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(DataError::InvalidJson { reason: "eof".to_string() }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(SourceError::RemoteStatus { status: 404, body: String::new() }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(SourceError::InvalidPath { path: "../x".to_string() }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(TemplateError::Render { reason: "undefined".to_string() }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
