pub mod citations;
pub mod paper_analysis;
pub mod search;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::citation::CitationService;
use crate::config::AppConfig;
use crate::document::DocumentService;
use crate::error::{AppError, AppResult};
use crate::llm::{EmbeddingProvider, ResearchAssistant, SemanticSearch};
use crate::papers::PaperIndex;
use crate::providers::traits::CompletionProvider;
use crate::search::PaperSearch;
use crate::session::{InMemorySessionStore, SessionStore};

pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
const MAX_CONCURRENT_REQUESTS: usize = 128;

#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<DocumentService>,
    pub semantic: Arc<SemanticSearch>,
    pub assistant: Arc<ResearchAssistant>,
    pub papers: Arc<PaperSearch>,
    pub citations: Arc<CitationService>,
    embedding_model: Option<String>,
}

impl AppState {
    /// Wires every service around one session store, one generative provider
    /// and at most one embedding model.
    pub fn new(
        config: &AppConfig,
        completion: Arc<dyn CompletionProvider>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        index: Arc<dyn PaperIndex>,
    ) -> Self {
        let sessions: Arc<dyn SessionStore> =
            Arc::new(InMemorySessionStore::with_capacity(config.session_capacity));

        Self {
            documents: Arc::new(DocumentService::new(
                sessions.clone(),
                embedder.clone(),
                config.chunking,
            )),
            semantic: Arc::new(SemanticSearch::new(sessions, embedder.clone())),
            assistant: Arc::new(ResearchAssistant::new(completion)),
            papers: Arc::new(PaperSearch::new(
                index.clone(),
                embedder.clone(),
                config.default_search_category.clone(),
            )),
            citations: Arc::new(CitationService::new(index)),
            embedding_model: embedder.map(|e| e.model_name().to_string()),
        }
    }
}

/// Serializes `payload` and marks it successful. `payload` must serialize to
/// a JSON object.
pub(crate) fn success<T: Serialize>(payload: T) -> AppResult<Json<Value>> {
    let mut value = serde_json::to_value(payload)
        .map_err(|e| AppError::Upstream(format!("Failed to encode response: {}", e)))?;
    match value.as_object_mut() {
        Some(object) => {
            object.insert("success".to_string(), Value::Bool(true));
            Ok(Json(value))
        }
        None => Err(AppError::Upstream("Response payload is not an object".to_string())),
    }
}

/// One permit pool for the whole router. `Router::layer` wraps each route on
/// its own, so the semaphore has to be shared between the copies.
pub(crate) fn request_limit(max: usize) -> GlobalConcurrencyLimitLayer {
    GlobalConcurrencyLimitLayer::new(max)
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));

    let paper_analysis = Router::new()
        .route("/upload-pdf", post(paper_analysis::upload_pdf))
        .route("/generate-summary", post(paper_analysis::generate_summary))
        .route("/answer-question", post(paper_analysis::answer_question))
        .route("/analyze-structure", post(paper_analysis::analyze_structure))
        .route("/extract-key-info", post(paper_analysis::extract_key_info))
        .route("/generate-insights", post(paper_analysis::generate_insights))
        .route("/suggest-questions", post(paper_analysis::suggest_questions))
        .route("/literature-review", post(paper_analysis::literature_review))
        .route("/research-trends", post(paper_analysis::research_trends))
        .route("/research-proposal", post(paper_analysis::research_proposal));

    let search = Router::new()
        .route("/search-papers", post(search::search_papers))
        .route("/find-similar", post(search::find_similar))
        .route("/trending-topics", get(search::trending_topics))
        .route("/paper-details", post(search::paper_details));

    let citations = Router::new()
        .route("/generate-citation", post(citations::generate_citation))
        .route("/generate-bibliography", post(citations::generate_bibliography))
        .route("/paper-metadata", post(citations::paper_metadata))
        .route("/download", post(citations::download));

    info!("Setting up API routes with permissive CORS");

    Router::new()
        .route("/health", get(health_check))
        .nest("/paper-analysis", paper_analysis)
        .nest("/search", search)
        .nest("/citations", citations)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(request_limit(MAX_CONCURRENT_REQUESTS))
        .layer(middleware::from_fn(log_request))
        .layer(cors)
        .with_state(state)
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let duration_ms = started.elapsed().as_millis() as u64;
    info!(
        method = %method,
        path = %path,
        status = status,
        duration_ms = duration_ms,
        "{} {} - {} ({}ms)",
        method,
        path,
        status,
        duration_ms
    );
    response
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "generation": state.assistant.model_info(),
        "embedding": state.embedding_model,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use tokio::sync::Notify;
    use tower::ServiceExt;

    fn get_request(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_request_limit_is_shared_across_routes() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let slow = {
            let entered = entered.clone();
            let release = release.clone();
            move || async move {
                entered.notify_one();
                release.notified().await;
                "slow"
            }
        };
        let app = Router::new()
            .route("/slow", get(slow))
            .route("/fast", get(|| async { "fast" }))
            .layer(request_limit(1));

        let pending = tokio::spawn(app.clone().oneshot(get_request("/slow")));
        entered.notified().await;

        let blocked = tokio::time::timeout(
            Duration::from_millis(100),
            app.clone().oneshot(get_request("/fast")),
        )
        .await;
        assert!(blocked.is_err(), "second route should wait for the shared permit");

        release.notify_one();
        let response = pending.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get_request("/fast")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[derive(Serialize)]
    struct Payload {
        answer: &'static str,
    }

    #[test]
    fn test_success_marks_objects() {
        let Json(value) = success(Payload { answer: "42" }).unwrap();
        assert_eq!(value, json!({ "answer": "42", "success": true }));
    }

    #[test]
    fn test_success_rejects_non_objects() {
        assert!(matches!(success(vec![1, 2]), Err(AppError::Upstream(_))));
    }
}
