//! Document template routes

use crate::{
    AppState,
    error::Result,
    models::{
        ApiResponse, RenderTemplateRequest, RenderTemplateResponse, TemplateContextResponse,
        TemplateSummary,
    },
    routes::{attachment, blocking},
};
use axum::{
    Json, Router,
    extract::{Path, State},
    response::Response,
    routing::{get, post},
};
use folio::{FolioError, RenderedOutput, TemplateError};
use tracing::{debug, info};

/// Create template routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_templates))
        .route("/{name}/context", get(default_context))
        .route("/{name}/render", post(render_template))
        .route("/{name}/download", post(download_template))
}

/// List the templates of the templates directory
async fn list_templates(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<TemplateSummary>>>> {
    let store = state.templates.clone();
    let names = blocking(move || store.list_templates()).await?;
    debug!("Found {} template(s)", names.len());

    let summaries: Vec<TemplateSummary> = names.into_iter().map(TemplateSummary::new).collect();
    Ok(Json(if summaries.is_empty() {
        let message = format!(
            "No template found in {}",
            state.templates.templates_dir().display()
        );
        ApiResponse::with_message(summaries, message)
    } else {
        ApiResponse::new(summaries)
    }))
}

/// Editable starting context for a template
async fn default_context(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<TemplateContextResponse>>> {
    let store = state.templates.clone();
    let lookup = name.clone();
    let context = blocking(move || {
        if !store.list_templates()?.contains(&lookup) {
            return Err(FolioError::Template(TemplateError::NotFound { name: lookup }));
        }
        let context = store.default_context(&lookup);
        Ok(serde_json::to_string_pretty(&context)?)
    })
    .await?;

    Ok(Json(ApiResponse::new(TemplateContextResponse { name, context })))
}

/// Render a template with the submitted context and save the result
async fn render_template(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<RenderTemplateRequest>,
) -> Result<Json<ApiResponse<RenderTemplateResponse>>> {
    let output = generate(&state, name, request).await?;
    let message = format!("Document written to {}", output.file_path.display());
    Ok(Json(ApiResponse::with_message(output.into(), message)))
}

/// Render a template and offer the result as a download
async fn download_template(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<RenderTemplateRequest>,
) -> Result<Response> {
    let output = generate(&state, name, request).await?;
    Ok(attachment(
        &output.file_name(),
        output.format.mime_type(),
        output.content,
    ))
}

async fn generate(
    state: &AppState,
    name: String,
    request: RenderTemplateRequest,
) -> Result<RenderedOutput> {
    info!("Rendering template {}", name);
    let store = state.templates.clone();
    blocking(move || store.generate(&name, &request.context)).await
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

    fn template_dir() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::write(
            templates.join("letter.md.j2"),
            "Dear {{ recipient_name }},\n\n{{ body }}\n",
        )
        .unwrap();
        dir
    }

    fn config(root: &Path) -> ServerConfig {
        ServerConfig {
            templates_dir: root.join("templates"),
            output_dir: root.join("output"),
            notebooks_dir: root.join("notebooks"),
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn lists_templates_with_formats() {
        let dir = template_dir();
        let response = app(config(dir.path()))
            .await
            .oneshot(get("/api/templates"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(
            body["data"],
            json!([{"name": "letter.md.j2", "format": "markdown", "mime_type": "text/markdown"}])
        );
    }

    #[tokio::test]
    async fn empty_template_directory_has_a_message() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(config(dir.path()))
            .await
            .oneshot(get("/api/templates"))
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["data"], json!([]));
        assert!(body["message"].as_str().unwrap().starts_with("No template found"));
    }

    #[tokio::test]
    async fn default_context_is_pretty_json() {
        let dir = template_dir();
        let response = app(config(dir.path()))
            .await
            .oneshot(get("/api/templates/letter.md.j2/context"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let text = body["data"]["context"].as_str().unwrap();
        assert!(text.contains('\n'));
        let context: serde_json::Value = serde_json::from_str(text).unwrap();
        assert!(context["recipient_name"].is_string());
    }

    #[tokio::test]
    async fn context_of_unknown_template_is_not_found() {
        let dir = template_dir();
        let response = app(config(dir.path()))
            .await
            .oneshot(get("/api/templates/missing.j2/context"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn render_writes_the_output_file() {
        let dir = template_dir();
        let response = app(config(dir.path()))
            .await
            .oneshot(post_json(
                "/api/templates/letter.md.j2/render",
                json!({"context": "{\"recipient_name\": \"Ada\", \"body\": \"Hello.\"}"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["content"], "Dear Ada,\n\nHello.\n");
        assert_eq!(body["data"]["format"], "markdown");
        assert_eq!(body["data"]["file_name"], "letter_output.md");
        assert_eq!(body["data"]["mime_type"], "text/markdown");
        let written =
            std::fs::read_to_string(dir.path().join("output/letter_output.md")).unwrap();
        assert_eq!(written, "Dear Ada,\n\nHello.\n");
    }

    #[tokio::test]
    async fn invalid_json_is_a_bad_request() {
        let dir = template_dir();
        let response = app(config(dir.path()))
            .await
            .oneshot(post_json(
                "/api/templates/letter.md.j2/render",
                json!({"context": "{\"recipient_name\": "}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON:"));
        assert!(!dir.path().join("output").exists());
    }

    #[tokio::test]
    async fn missing_variable_is_unprocessable() {
        let dir = template_dir();
        let response = app(config(dir.path()))
            .await
            .oneshot(post_json(
                "/api/templates/letter.md.j2/render",
                json!({"context": "{\"recipient_name\": \"Ada\"}"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn download_uses_the_template_format() {
        let dir = template_dir();
        let response = app(config(dir.path()))
            .await
            .oneshot(post_json(
                "/api/templates/letter.md.j2/download",
                json!({"context": "{\"recipient_name\": \"Ada\", \"body\": \"Hi\"}"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers().clone();
        assert_eq!(headers[header::CONTENT_TYPE], "text/markdown; charset=utf-8");
        assert!(
            headers[header::CONTENT_DISPOSITION]
                .to_str()
                .unwrap()
                .contains("letter_output.md")
        );
        assert_eq!(body_text(response).await, "Dear Ada,\n\nHi\n");
    }
}
