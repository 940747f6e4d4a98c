//! HTTP route handlers

pub mod notebooks;
pub mod templates;
pub mod ui;

use axum::{
    http::header,
    response::{IntoResponse, Response},
};

use crate::error::{ApiError, Result};

/// Run blocking library work off the async worker threads
pub(crate) async fn blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> folio::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ApiError::internal(&format!("Background task failed: {}", e)))?
        .map_err(ApiError::from)
}

/// Response offering `body` as a file download named `file_name`
pub(crate) fn attachment(file_name: &str, content_type: &str, body: String) -> Response {
    // Plain ASCII fallback name, RFC 5987 encoded name for everything else
    let fallback: String = file_name
        .chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' && c != '\\' { c } else { '_' })
        .collect();
    let disposition = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(file_name)
    );

    (
        [
            (header::CONTENT_TYPE, format!("{}; charset=utf-8", content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}
