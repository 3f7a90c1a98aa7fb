use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::{AppError, AppResult};
use crate::llm::embeddings::EmbeddingProvider;
use crate::session::SessionStore;

pub const DEFAULT_TOP_K: usize = 3;

/// Cosine similarity. A zero-norm vector, or a pair of different lengths,
/// has similarity 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b.iter())
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Returns `(index, score)` for the `k` vectors most similar to `query`, best
/// first. Equal scores keep their original order.
pub fn rank_top_k(query: &[f32], vectors: &[Vec<f32>], k: usize) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| (i, cosine_similarity(query, v)))
        .collect();

    // sort_by is stable, so ties stay in chunk order
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(k);
    scored
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchResult {
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
}

pub struct SemanticSearch {
    sessions: Arc<dyn SessionStore>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl SemanticSearch {
    pub fn new(sessions: Arc<dyn SessionStore>, embedder: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self { sessions, embedder }
    }

    /// The `k` chunks of a session closest to `query`.
    pub async fn top_k(&self, session_key: &str, query: &str, k: usize) -> AppResult<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(AppError::validation("Query is required"));
        }
        if k == 0 {
            return Err(AppError::validation("k must be a positive integer"));
        }

        let session = self.sessions.require(session_key)?;
        if session.embeddings().is_empty() {
            return Err(AppError::not_found("Document session has no embedded chunks"));
        }

        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| AppError::unavailable("No embedding model configured"))?;

        let query_embedding = embedder.embed(query).await.map_err(|e| {
            error!("Failed to embed query: {:#}", e);
            AppError::unavailable(format!("Embedding model unavailable: {:#}", e))
        })?;

        let ranked = rank_top_k(&query_embedding, session.embeddings(), k);
        info!(
            "Ranked {} chunks for session {}, returning {}",
            session.chunks().len(),
            session_key,
            ranked.len()
        );

        Ok(ranked
            .into_iter()
            .map(|(index, score)| SearchResult {
                chunk_index: index,
                text: session.chunks()[index].clone(),
                score,
            })
            .collect())
    }
}
