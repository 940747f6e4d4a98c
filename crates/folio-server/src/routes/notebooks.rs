//! Notebook listing and rendering routes

use crate::{
    AppState,
    error::Result,
    models::{
        ApiResponse, NotebookListQuery, NotebookListResponse, RenderNotebookRequest,
        RenderNotebookResponse,
    },
    routes::{attachment, blocking},
};
use axum::{
    Json, Router,
    extract::{Query, State},
    response::Response,
    routing::{get, post},
};
use folio::{ExportResult, NotebookRef, Origin, RenderOptions, download_name};
use tracing::{debug, info};

/// Create notebook routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notebooks))
        .route("/render", post(render_notebook))
        .route("/download", post(download_notebook))
}

/// List notebooks from the requested source, falling back to local ones
async fn list_notebooks(
    State(state): State<AppState>,
    Query(query): Query<NotebookListQuery>,
) -> Result<Json<ApiResponse<NotebookListResponse>>> {
    debug!("Listing notebooks with query: {:?}", query);

    let mode = query.source_mode()?;
    let viewer = state.viewer.clone();
    let requested = mode.clone();
    let filter = query.filter.clone();
    let resolution = blocking(move || viewer.list(&requested, &filter)).await?;

    let response = NotebookListResponse::new(resolution, &mode);
    Ok(Json(match response.fallback_reason.clone() {
        Some(reason) => ApiResponse::with_message(
            response,
            format!("Remote listing unavailable, showing local notebooks: {}", reason),
        ),
        None => ApiResponse::new(response),
    }))
}

/// Convert a notebook to HTML for display
async fn render_notebook(
    State(state): State<AppState>,
    Json(request): Json<RenderNotebookRequest>,
) -> Result<Json<ApiResponse<RenderNotebookResponse>>> {
    let execute_requested = request.execute;
    let (notebook, result) = export(&state, request).await?;

    let response = RenderNotebookResponse {
        html: result.html,
        executed: result.executed,
        source: origin_label(&notebook.origin),
        file_name: download_name(&notebook),
    };
    Ok(Json(if execute_requested && !response.executed {
        ApiResponse::with_message(
            response,
            "Execution failed, showing the notebook without fresh outputs".to_string(),
        )
    } else {
        ApiResponse::new(response)
    }))
}

/// Convert a notebook to HTML and offer it as a download
async fn download_notebook(
    State(state): State<AppState>,
    Json(request): Json<RenderNotebookRequest>,
) -> Result<Response> {
    let (notebook, result) = export(&state, request).await?;
    Ok(attachment(&download_name(&notebook), "text/html", result.html))
}

async fn export(
    state: &AppState,
    request: RenderNotebookRequest,
) -> Result<(NotebookRef, ExportResult)> {
    let notebook = request.notebook()?;
    let options = RenderOptions {
        execute: request.execute,
        css: request
            .css
            .unwrap_or_else(|| state.config.default_css.clone()),
    };
    info!("Rendering notebook {} (execute: {})", notebook, options.execute);

    let viewer = state.viewer.clone();
    let target = notebook.clone();
    let result = blocking(move || viewer.render(&target, &options)).await?;
    Ok((notebook, result))
}

fn origin_label(origin: &Origin) -> &'static str {
    match origin {
        Origin::Local => "Local",
        Origin::Remote(_) => "Remote",
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{StatusCode, header};
    use serde_json::json;
    use std::path::Path;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::config::ServerConfig;
    use crate::test_support::{app, body_json, body_text, get, post_json};

    fn notebook_tree() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let notebook = json!({
            "nbformat": 4,
            "nbformat_minor": 5,
            "metadata": {},
            "cells": [{"cell_type": "markdown", "metadata": {}, "source": "# Title"}]
        })
        .to_string();
        std::fs::write(dir.path().join("a.ipynb"), &notebook).unwrap();
        let checkpoints = dir.path().join(".ipynb_checkpoints");
        std::fs::create_dir_all(&checkpoints).unwrap();
        std::fs::write(checkpoints.join("a-checkpoint.ipynb"), &notebook).unwrap();
        dir
    }

    fn config(root: &Path) -> ServerConfig {
        ServerConfig {
            notebooks_dir: root.to_path_buf(),
            // Nothing listens on port 1, so remote calls fail fast
            github_api_url: "http://127.0.0.1:1".to_string(),
            github_raw_url: "http://127.0.0.1:1".to_string(),
            http_timeout_seconds: 2,
            jupyter_bin: Some("/nonexistent/jupyter".into()),
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn local_listing_skips_checkpoints() {
        let dir = notebook_tree();
        let response = app(config(dir.path()))
            .await
            .oneshot(get("/api/notebooks?mode=local"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["source"], "Local");
        assert_eq!(body["data"]["paths"], json!(["a.ipynb"]));
        assert!(body.get("message").is_none());
    }

    #[tokio::test]
    async fn unreachable_remote_falls_back_to_local() {
        let dir = notebook_tree();
        let response = app(config(dir.path()))
            .await
            .oneshot(get("/api/notebooks?mode=remote&owner=octo&repo=handbook"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["source"], "Local");
        assert_eq!(body["data"]["origin"]["kind"], "local");
        assert_eq!(body["data"]["paths"], json!(["a.ipynb"]));
        assert!(body["data"]["fallback_reason"].is_string());
        assert!(body["message"].as_str().unwrap().contains("showing local notebooks"));
    }

    #[tokio::test]
    async fn remote_mode_requires_owner_and_repo() {
        let dir = notebook_tree();
        let response = app(config(dir.path()))
            .await
            .oneshot(get("/api/notebooks?mode=remote&owner=octo"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn render_returns_html_with_css() {
        let dir = notebook_tree();
        let response = app(config(dir.path()))
            .await
            .oneshot(post_json(
                "/api/notebooks/render",
                json!({"path": "a.ipynb", "css": "h1 { color: teal }"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let html = body["data"]["html"].as_str().unwrap();
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<style>h1 { color: teal }</style>"));
        assert_eq!(body["data"]["executed"], false);
        assert_eq!(body["data"]["source"], "Local");
        assert_eq!(body["data"]["file_name"], "a.html");
    }

    #[tokio::test]
    async fn failed_execution_still_renders() {
        let dir = notebook_tree();
        let response = app(config(dir.path()))
            .await
            .oneshot(post_json(
                "/api/notebooks/render",
                json!({"path": "a.ipynb", "execute": true}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["executed"], false);
        assert!(body["message"].as_str().unwrap().contains("Execution failed"));
    }

    #[tokio::test]
    async fn render_rejects_paths_outside_root() {
        let dir = notebook_tree();
        let response = app(config(dir.path()))
            .await
            .oneshot(post_json(
                "/api/notebooks/render",
                json!({"path": "../a.ipynb"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["status"], 400);
    }

    #[tokio::test]
    async fn render_of_missing_notebook_is_not_found() {
        let dir = notebook_tree();
        let response = app(config(dir.path()))
            .await
            .oneshot(post_json(
                "/api/notebooks/render",
                json!({"path": "missing.ipynb"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn download_is_an_html_attachment() {
        let dir = notebook_tree();
        let response = app(config(dir.path()))
            .await
            .oneshot(post_json(
                "/api/notebooks/download",
                json!({"path": "a.ipynb", "origin": {"kind": "local"}}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers().clone();
        assert_eq!(headers[header::CONTENT_TYPE], "text/html; charset=utf-8");
        assert!(
            headers[header::CONTENT_DISPOSITION]
                .to_str()
                .unwrap()
                .contains("filename=\"a.html\"")
        );
        assert!(body_text(response).await.contains("<h1>Title</h1>"));
    }
}
