//! Folio HTTP API Server
//!
//! Serves the notebook viewer and the document template generator over a
//! JSON API, plus a single-page UI at `/`.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    response::Json,
    routing::get,
};
use folio::{Exporter, NotebookViewer, RemoteClient, Resolver, TemplateStore};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

mod config;
mod error;
mod models;
mod routes;

use config::ServerConfig;
use error::{ApiError, Result};

/// Main application state
#[derive(Clone)]
pub struct AppState {
    pub viewer: Arc<NotebookViewer>,
    pub templates: Arc<TemplateStore>,
    pub config: ServerConfig,
}

impl AppState {
    /// Build the viewer and template store described by `config`
    ///
    /// The remote client is blocking, so this must run outside the async
    /// runtime's worker threads.
    pub fn new(config: ServerConfig) -> folio::Result<Self> {
        let remote = RemoteClient::new(config.remote_config())?;
        let resolver = Resolver::new(config.notebooks_dir.clone(), Some(remote));
        let exporter =
            Exporter::with_templates_dir(config.executor(), config.export_templates_dir.clone());

        Ok(Self {
            viewer: Arc::new(NotebookViewer::new(resolver, exporter)),
            templates: Arc::new(TemplateStore::new(
                config.templates_dir.clone(),
                config.output_dir.clone(),
            )),
            config,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| {
            "folio_server=debug,folio=debug,tower_http=debug".to_string()
        }))
        .init();

    // Load configuration
    let config = ServerConfig::from_env()?;
    info!("Starting Folio Server on {}:{}", config.host, config.port);
    info!(
        "Notebooks from {}, templates from {}, output to {}",
        config.notebooks_dir.display(),
        config.templates_dir.display(),
        config.output_dir.display()
    );
    if config.github_token.is_none() {
        info!("GITHUB_TOKEN not set, remote listings use anonymous API access");
    }

    let state_config = config.clone();
    let state = tokio::task::spawn_blocking(move || AppState::new(state_config))
        .await
        .map_err(|e| ApiError::internal(&format!("Failed to build application state: {}", e)))??;

    // Build router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    Router::new()
        // Health check
        .route("/health", get(health_check))
        .route("/", get(routes::ui::index))
        // API routes
        .nest("/api", api_routes())
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(10 * 1024 * 1024)),
        )
        .with_state(state)
}

/// API routes
fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/notebooks", routes::notebooks::router())
        .nest("/templates", routes::templates::router())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

/// Health check endpoint
async fn health_check() -> Result<Json<Value>> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "folio-server",
        "version": env!("CARGO_PKG_VERSION"),
        "library_version": folio::version(),
        "timestamp": time::OffsetDateTime::now_utc()
    })))
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::{
        Router,
        body::Body,
        http::{Request, header},
        response::Response,
    };
    use serde_json::Value;

    use crate::{AppState, config::ServerConfig, create_router};

    pub async fn app(config: ServerConfig) -> Router {
        let state = tokio::task::spawn_blocking(move || AppState::new(config))
            .await
            .unwrap()
            .unwrap();
        create_router(state)
    }

    pub fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    pub fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    pub async fn body_json(response: Response) -> Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use tower::ServiceExt;

    use super::test_support::{app, body_json, body_text, get};
    use crate::config::ServerConfig;

    #[tokio::test]
    async fn health_reports_service_and_version() {
        let response = app(ServerConfig::default())
            .await
            .oneshot(get("/health"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "folio-server");
    }

    #[tokio::test]
    async fn index_serves_the_ui() {
        let response = app(ServerConfig::default())
            .await
            .oneshot(get("/"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Templates"));
        assert!(html.contains("Notebooks"));
    }
}
