use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use validator::Validate;

use super::{success, AppState};
use crate::citation::{download_payload, CitationStyle};
use crate::error::AppResult;

fn parse_style(style: Option<&str>) -> AppResult<CitationStyle> {
    match style {
        Some(s) if !s.trim().is_empty() => s.parse(),
        _ => Ok(CitationStyle::Apa),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CitationRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "ArXiv URL is required"))]
    pub arxiv_url: String,
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BibliographyRequest {
    #[serde(default)]
    pub arxiv_urls: Vec<String>,
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MetadataRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "ArXiv URL is required"))]
    pub arxiv_url: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub citation: String,
    #[serde(default)]
    pub style: Option<String>,
}

pub async fn generate_citation(
    State(state): State<AppState>,
    Json(request): Json<CitationRequest>,
) -> AppResult<Json<Value>> {
    let style = parse_style(request.style.as_deref())?;
    request.validate()?;

    let generated = state
        .citations
        .generate_citation(&request.arxiv_url, style)
        .await?;
    success(generated)
}

pub async fn generate_bibliography(
    State(state): State<AppState>,
    Json(request): Json<BibliographyRequest>,
) -> AppResult<Response> {
    let style = parse_style(request.style.as_deref())?;

    let report = state
        .citations
        .generate_bibliography(&request.arxiv_urls, style)
        .await?;

    if !report.success {
        warn!("No citations could be generated for {} papers", report.total_papers);
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": "No citations could be generated",
                "failed_papers": report.failed_papers,
            })),
        )
            .into_response());
    }

    Ok(Json(report).into_response())
}

pub async fn paper_metadata(
    State(state): State<AppState>,
    Json(request): Json<MetadataRequest>,
) -> AppResult<Json<Value>> {
    request.validate()?;
    let metadata = state.citations.paper_metadata(&request.arxiv_url).await?;
    success(json!({
        "metadata": metadata,
    }))
}

pub async fn download(Json(request): Json<DownloadRequest>) -> AppResult<Json<Value>> {
    let style = parse_style(request.style.as_deref())?;
    let payload = download_payload(&request.citation, style)?;
    success(payload)
}
