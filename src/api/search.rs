use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use super::{success, AppState};
use crate::error::AppResult;
use crate::search::DEFAULT_MAX_RESULTS;

#[derive(Debug, Deserialize)]
pub struct SearchPapersRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub max_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct FindSimilarRequest {
    #[serde(default)]
    pub paper_title: String,
    #[serde(default)]
    pub paper_abstract: String,
    #[serde(default)]
    pub max_results: Option<usize>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PaperDetailsRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "ArXiv ID is required"))]
    pub arxiv_id: String,
}

pub async fn search_papers(
    State(state): State<AppState>,
    Json(request): Json<SearchPapersRequest>,
) -> AppResult<Json<Value>> {
    let papers = state
        .papers
        .find_similar_papers(
            &request.query,
            request.category.as_deref(),
            request.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
        )
        .await?;

    success(json!({
        "query": request.query,
        "total_results": papers.len(),
        "papers": papers,
    }))
}

pub async fn find_similar(
    State(state): State<AppState>,
    Json(request): Json<FindSimilarRequest>,
) -> AppResult<Json<Value>> {
    let papers = state
        .papers
        .find_similar_to_paper(
            &request.paper_title,
            &request.paper_abstract,
            request.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
        )
        .await?;

    success(json!({
        "total_results": papers.len(),
        "similar_papers": papers,
    }))
}

pub async fn trending_topics(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let report = state.papers.trending_topics().await;
    success(json!({
        "trending_topics": report.topics,
        "fallback": report.fallback,
    }))
}

pub async fn paper_details(
    State(state): State<AppState>,
    Json(request): Json<PaperDetailsRequest>,
) -> AppResult<Json<Value>> {
    request.validate()?;
    let paper = state.papers.paper_details(&request.arxiv_id).await?;
    success(json!({
        "paper": paper,
    }))
}
