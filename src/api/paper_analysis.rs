use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use validator::Validate;

use super::{success, AppState};
use crate::document::validate_pdf_filename;
use crate::error::{AppError, AppResult};
use crate::llm::assistant::ReviewPaper;
use crate::llm::semantic_search::DEFAULT_TOP_K;

#[derive(Debug, Deserialize, Validate)]
pub struct SessionRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Session ID is required"))]
    pub session_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct QuestionRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Session ID is required"))]
    pub session_id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub k: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TextRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct TopicRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub context: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LiteratureReviewRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Papers are required"))]
    pub papers: Vec<ReviewPaper>,
}

#[derive(Debug, Deserialize)]
pub struct TrendsRequest {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub time_period: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProposalRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub objectives: Vec<String>,
}

pub async fn upload_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<Value>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Invalid upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        validate_pdf_filename(&filename)?;

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::validation(format!("Failed to read upload: {}", e)))?;

        info!("Received upload {} ({} bytes)", filename, bytes.len());
        let doc = state.documents.ingest_pdf(&filename, bytes.to_vec()).await?;

        return success(json!({
            "message": "PDF processed successfully",
            "session_id": doc.session_id,
            "filename": doc.filename,
            "text": doc.text,
            "text_length": doc.text_length,
            "chunks": doc.chunks,
            "chunks_count": doc.chunks_count,
        }));
    }

    warn!("Upload request without a file field");
    Err(AppError::validation("No file uploaded"))
}

pub async fn generate_summary(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> AppResult<Json<Value>> {
    request.validate()?;
    let text = state.documents.session_text(&request.session_id)?;
    let summary = state.assistant.summarize(&text).await?;

    success(json!({
        "session_id": request.session_id,
        "summary": summary,
    }))
}

pub async fn answer_question(
    State(state): State<AppState>,
    Json(request): Json<QuestionRequest>,
) -> AppResult<Json<Value>> {
    if request.question.trim().is_empty() {
        return Err(AppError::validation("Question is required"));
    }
    request.validate()?;

    let k = request.k.unwrap_or(DEFAULT_TOP_K);
    let sources = state
        .semantic
        .top_k(&request.session_id, &request.question, k)
        .await?;
    let context: Vec<String> = sources.iter().map(|s| s.text.clone()).collect();
    let answer = state.assistant.answer_question(&request.question, &context).await?;

    success(json!({
        "question": request.question,
        "answer": answer,
        "sources": sources,
    }))
}

pub async fn analyze_structure(
    State(state): State<AppState>,
    Json(request): Json<TextRequest>,
) -> AppResult<Json<Value>> {
    let analysis = state.assistant.analyze_structure(&request.text).await?;
    success(json!({
        "analysis": analysis,
        "text_length": request.text.chars().count(),
    }))
}

pub async fn extract_key_info(
    State(state): State<AppState>,
    Json(request): Json<TextRequest>,
) -> AppResult<Json<Value>> {
    let extracted = state.assistant.extract_key_information(&request.text).await?;
    success(json!({
        "extracted_info": extracted,
        "text_length": request.text.chars().count(),
    }))
}

pub async fn generate_insights(
    State(state): State<AppState>,
    Json(request): Json<TopicRequest>,
) -> AppResult<Json<Value>> {
    let insights = state
        .assistant
        .research_insights(&request.topic, &request.context)
        .await?;
    success(json!({
        "topic": request.topic,
        "insights": insights,
        "model": state.assistant.model_info(),
    }))
}

pub async fn suggest_questions(
    State(state): State<AppState>,
    Json(request): Json<TopicRequest>,
) -> AppResult<Json<Value>> {
    let questions = state
        .assistant
        .research_questions(&request.topic, &request.context)
        .await?;
    success(json!({
        "topic": request.topic,
        "research_questions": questions,
    }))
}

pub async fn literature_review(
    State(state): State<AppState>,
    Json(request): Json<LiteratureReviewRequest>,
) -> AppResult<Json<Value>> {
    if request.topic.trim().is_empty() {
        return Err(AppError::validation("Topic is required"));
    }
    request.validate()?;

    let review = state
        .assistant
        .literature_review(&request.topic, &request.papers)
        .await?;
    success(json!({
        "topic": request.topic,
        "literature_review": review,
        "papers_analyzed": request.papers.len(),
    }))
}

pub async fn research_trends(
    State(state): State<AppState>,
    Json(request): Json<TrendsRequest>,
) -> AppResult<Json<Value>> {
    let period = request
        .time_period
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| "recent".to_string());
    let analysis = state.assistant.research_trends(&request.field, &period).await?;

    success(json!({
        "field": request.field,
        "time_period": period,
        "trends_analysis": analysis,
    }))
}

pub async fn research_proposal(
    State(state): State<AppState>,
    Json(request): Json<ProposalRequest>,
) -> AppResult<Json<Value>> {
    let proposal = state
        .assistant
        .research_proposal(&request.topic, &request.objectives)
        .await?;
    success(json!({
        "topic": request.topic,
        "objectives": request.objectives,
        "proposal": proposal,
    }))
}
