//! REST API for the copilot service
//!
//! Thin transport over the application context: ingestion endpoints, the ask
//! endpoint, and the health probe. Handlers map errors to status codes and
//! never panic.

use crate::error::CopilotError;
use crate::ingest::IngestResult;
use crate::responder::AskResponse;
use crate::state::{AppContext, HealthReport};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

/// Ingest request bodies are bounded at 5 MiB
const INGEST_BODY_LIMIT: usize = 5 * 1024 * 1024;

/// Ask request bodies are bounded at 1 MiB
const ASK_BODY_LIMIT: usize = 1024 * 1024;

const DEFAULT_CRAWL_DEPTH: usize = 2;
const DEFAULT_CRAWL_PAGES: usize = 50;

/// Request to ingest pasted text
#[derive(Debug, Deserialize)]
pub struct PasteRequest {
    #[serde(default)]
    pub title: Option<String>,
    pub text: String,
}

/// Request to crawl and ingest a URL
#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    pub url: String,
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub max_pages: Option<usize>,
}

/// Request to answer a question
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub provider_override: Option<String>,
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error wrapper carrying the HTTP status mapping
pub struct ApiError(CopilotError);

impl From<CopilotError> for ApiError {
    fn from(e: CopilotError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CopilotError::BadInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(category = self.0.category(), error = %self.0, "request failed");
        } else {
            warn!(error = %self.0, "request rejected");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// Build the application router
pub fn router(context: Arc<AppContext>) -> Router {
    let cors = cors_layer(&context.settings.server.allowed_origins);

    let ingest_routes = Router::new()
        .route("/ingest/paste", post(ingest_paste))
        .route("/ingest/pdf", post(ingest_pdf))
        .route("/ingest/url", post(ingest_url))
        .layer(DefaultBodyLimit::max(INGEST_BODY_LIMIT));

    let ask_routes = Router::new()
        .route("/ask", post(ask))
        .layer(DefaultBodyLimit::max(ASK_BODY_LIMIT));

    Router::new()
        .merge(ingest_routes)
        .merge(ask_routes)
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(context)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    if allowed_origins.is_empty() {
        return CorsLayer::new();
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| o.parse::<HeaderValue>().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn ingest_paste(
    State(context): State<Arc<AppContext>>,
    Json(request): Json<PasteRequest>,
) -> Result<Json<IngestResult>, ApiError> {
    let title = request.title.unwrap_or_default();
    let result = context.ingest_text(&title, &request.text).await?;
    Ok(Json(result))
}

async fn ingest_pdf(
    State(context): State<Arc<AppContext>>,
    mut multipart: Multipart,
) -> Result<Json<IngestResult>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CopilotError::BadInput(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let title = field.file_name().unwrap_or("Untitled").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| CopilotError::BadInput(format!("unreadable upload: {e}")))?;
        let result = context.ingest_pdf(&title, &bytes).await?;
        return Ok(Json(result));
    }
    Err(CopilotError::BadInput("missing file field".to_string()).into())
}

async fn ingest_url(
    State(context): State<Arc<AppContext>>,
    Json(request): Json<UrlRequest>,
) -> Result<Json<IngestResult>, ApiError> {
    let url = request.url.trim();
    if url.is_empty() || !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(CopilotError::BadInput(format!("malformed url {url:?}")).into());
    }
    let result = context
        .ingest_url(
            url,
            request.max_depth.unwrap_or(DEFAULT_CRAWL_DEPTH),
            request.max_pages.unwrap_or(DEFAULT_CRAWL_PAGES),
        )
        .await?;
    Ok(Json(result))
}

async fn ask(
    State(context): State<Arc<AppContext>>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let response = context
        .ask(
            &request.question,
            request.top_k,
            request.provider_override.as_deref(),
        )
        .await?;
    Ok(Json(response))
}

async fn health(State(context): State<Arc<AppContext>>) -> Json<HealthReport> {
    Json(context.health().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::embedding::StubEmbedder;
    use crate::llm::StubProvider;
    use crate::store::{InMemoryGraphStore, InMemoryVectorStore};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let mut settings = Settings::default();
        settings.model.provider = "stub".to_string();
        settings.embedding.provider = "stub".to_string();

        let context = AppContext::with_parts(
            settings.clone(),
            Arc::new(StubEmbedder::new(settings.embedding.dimension)),
            Arc::new(InMemoryVectorStore::new(settings.embedding.dimension)),
            Arc::new(InMemoryGraphStore::new()),
            Arc::new(StubProvider),
            "stub".to_string(),
        );
        router(Arc::new(context))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_paste_then_ask() {
        let app = test_router();

        let response = app
            .clone()
            .oneshot(
                Request::post("/ingest/paste")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"title":"Widgets 101","text":"A widget has parts A, B, and C."}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let ingest = body_json(response).await;
        assert!(ingest["chunks"].as_u64().unwrap() >= 1);
        assert_eq!(ingest["chunks"], ingest["vector_count"]);

        let response = app
            .oneshot(
                Request::post("/ask")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"question":"What parts does a widget have?"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let ask = body_json(response).await;
        assert_eq!(ask["answer"], "hi, this was a test you pass");
        assert_eq!(ask["provider"], "stub");
    }

    #[tokio::test]
    async fn test_empty_question_is_400() {
        let app = test_router();
        let response = app
            .oneshot(
                Request::post("/ask")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"question":"   "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("question"));
    }

    #[tokio::test]
    async fn test_malformed_url_is_400() {
        let app = test_router();
        let response = app
            .oneshot(
                Request::post("/ingest/url")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"url":"ftp://nope"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = test_router();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["graph_backend"], "memory");
        assert_eq!(body["provider"], "stub");
    }

    #[tokio::test]
    async fn test_oversized_ask_body_is_413() {
        let app = test_router();
        let big = format!(r#"{{"question":"{}"}}"#, "x".repeat(ASK_BODY_LIMIT + 16));
        let response = app
            .oneshot(
                Request::post("/ask")
                    .header("content-type", "application/json")
                    .body(Body::from(big))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
