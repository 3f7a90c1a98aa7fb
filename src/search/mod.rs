//! Related-paper discovery over the paper index.
//!
//! Every search fetches fresh candidates and embeds them again; nothing is
//! cached between queries.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};
use crate::llm::embeddings::EmbeddingProvider;
use crate::llm::semantic_search::cosine_similarity;
use crate::papers::{PaperDetails, PaperIndex, PaperRecord, MAX_CONCURRENT_LOOKUPS};

pub const MAX_CANDIDATES: usize = 20;
pub const DEFAULT_MAX_RESULTS: usize = 5;
const EXCERPT_CHARS: usize = 200;
const TRENDING_PER_CATEGORY: usize = 5;

const TRENDING_CATEGORIES: [(&str, &str, &str); 8] = [
    ("cs.LG", "machine learning", "Machine Learning"),
    ("cs.AI", "artificial intelligence", "Artificial Intelligence"),
    ("cs.CV", "computer vision", "Computer Vision"),
    ("cs.CL", "natural language processing", "Natural Language Processing"),
    ("cs.NE", "neural networks", "Neural Networks"),
    ("cs.RO", "robotics", "Robotics"),
    ("cs.CR", "cryptography", "Cryptography"),
    ("cs.DC", "distributed computing", "Distributed Computing"),
];

const FALLBACK_TOPICS: [(&str, &str, usize); 5] = [
    ("Machine Learning", "cs.LG", 15),
    ("Artificial Intelligence", "cs.AI", 12),
    ("Computer Vision", "cs.CV", 10),
    ("Natural Language Processing", "cs.CL", 8),
    ("Neural Networks", "cs.NE", 6),
];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaperHit {
    pub title: String,
    pub authors: String,
    #[serde(rename = "abstract")]
    pub excerpt: String,
    pub arxiv_id: String,
    pub published_date: Option<String>,
    pub categories: Vec<String>,
    pub pdf_url: Option<String>,
    pub abs_url: String,
    pub similarity_score: f32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrendingTopic {
    pub topic: String,
    pub category: String,
    pub paper_count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrendingReport {
    pub topics: Vec<TrendingTopic>,
    /// Set when no category could be fetched and the static list was used.
    pub fallback: bool,
}

fn excerpt(text: &str) -> String {
    match text.char_indices().nth(EXCERPT_CHARS) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Orders scored papers by similarity, newest first on exact ties.
pub fn rank_papers(mut scored: Vec<(PaperRecord, f32)>) -> Vec<(PaperRecord, f32)> {
    scored.sort_by(|(pa, sa), (pb, sb)| {
        sb.partial_cmp(sa)
            .unwrap_or(Ordering::Equal)
            .then_with(|| pb.published.cmp(&pa.published))
    });
    scored
}

pub struct PaperSearch {
    index: Arc<dyn PaperIndex>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    default_category: String,
}

impl PaperSearch {
    pub fn new(
        index: Arc<dyn PaperIndex>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        default_category: impl Into<String>,
    ) -> Self {
        Self {
            index,
            embedder,
            default_category: default_category.into(),
        }
    }

    pub async fn find_similar_papers(
        &self,
        concept: &str,
        category: Option<&str>,
        max_results: usize,
    ) -> AppResult<Vec<PaperHit>> {
        if concept.trim().is_empty() {
            return Err(AppError::validation("Query is required"));
        }
        let category = category
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(self.default_category.as_str());

        self.rank(concept.trim(), Some(category), max_results).await
    }

    pub async fn find_similar_to_paper(
        &self,
        title: &str,
        abstract_text: &str,
        max_results: usize,
    ) -> AppResult<Vec<PaperHit>> {
        if title.trim().is_empty() && abstract_text.trim().is_empty() {
            return Err(AppError::validation("Paper title or abstract is required"));
        }
        let query = format!("{} {}", title.trim(), abstract_text.trim());
        self.rank(query.trim(), Some(self.default_category.as_str()), max_results)
            .await
    }

    async fn rank(&self, query: &str, category: Option<&str>, max_results: usize) -> AppResult<Vec<PaperHit>> {
        let max_results = max_results.clamp(1, MAX_CANDIDATES);
        info!("Finding similar papers for: {}", excerpt(query));

        let candidates = self
            .index
            .search(query, category, max_results)
            .await
            .map_err(|e| {
                error!("Paper search failed: {:#}", e);
                AppError::upstream("Paper search failed", e)
            })?;

        if candidates.is_empty() {
            warn!("No papers found for the given query");
            return Ok(Vec::new());
        }

        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| AppError::unavailable("No embedding model configured"))?;

        let mut texts = Vec::with_capacity(candidates.len() + 1);
        texts.push(query.to_string());
        texts.extend(candidates.iter().map(|p| format!("{} {}", p.title, p.summary)));

        let mut embeddings = embedder.embed_batch(&texts).await.map_err(|e| {
            error!("Embedding paper candidates failed: {:#}", e);
            AppError::unavailable(format!("Embedding model unavailable: {:#}", e))
        })?;
        if embeddings.len() != texts.len() {
            return Err(AppError::Upstream(format!(
                "Embedding model returned {} vectors for {} inputs",
                embeddings.len(),
                texts.len()
            )));
        }
        let query_embedding = embeddings.remove(0);

        let scored = candidates
            .into_iter()
            .zip(embeddings.iter())
            .map(|(paper, embedding)| {
                let score = cosine_similarity(&query_embedding, embedding);
                (paper, score)
            })
            .collect();

        let hits: Vec<PaperHit> = rank_papers(scored)
            .into_iter()
            .map(|(paper, score)| PaperHit {
                authors: paper.authors.join(", "),
                excerpt: excerpt(&paper.summary),
                published_date: paper.published_date(),
                title: paper.title,
                arxiv_id: paper.arxiv_id,
                categories: paper.categories,
                pdf_url: paper.pdf_url,
                abs_url: paper.abs_url,
                similarity_score: score,
            })
            .collect();

        info!("Found {} similar papers", hits.len());
        Ok(hits)
    }

    pub async fn trending_topics(&self) -> TrendingReport {
        let lookups: Vec<_> = TRENDING_CATEGORIES
            .iter()
            .map(|(category, query, _)| {
                self.index.search(*query, Some(*category), TRENDING_PER_CATEGORY)
            })
            .collect();
        let results: Vec<_> = stream::iter(lookups)
            .buffered(MAX_CONCURRENT_LOOKUPS)
            .collect()
            .await;

        let mut topics: Vec<TrendingTopic> = TRENDING_CATEGORIES
            .iter()
            .zip(results)
            .filter_map(|((category, _, topic), result)| match result {
                Ok(papers) if !papers.is_empty() => Some(TrendingTopic {
                    topic: topic.to_string(),
                    category: category.to_string(),
                    paper_count: papers.len(),
                }),
                Ok(_) => None,
                Err(e) => {
                    warn!("Error getting trending papers for {}: {:#}", category, e);
                    None
                }
            })
            .collect();

        let fallback = topics.is_empty();
        if fallback {
            warn!("No trending topics found, returning defaults");
            topics = FALLBACK_TOPICS
                .iter()
                .map(|(topic, category, count)| TrendingTopic {
                    topic: topic.to_string(),
                    category: category.to_string(),
                    paper_count: *count,
                })
                .collect();
        }

        topics.sort_by(|a, b| b.paper_count.cmp(&a.paper_count));
        TrendingReport { topics, fallback }
    }

    pub async fn paper_details(&self, arxiv_id: &str) -> AppResult<PaperDetails> {
        let arxiv_id = arxiv_id.trim();
        if arxiv_id.is_empty() {
            return Err(AppError::validation("arXiv ID is required"));
        }

        let paper = self
            .index
            .fetch(arxiv_id)
            .await
            .map_err(|e| {
                error!("Fetching paper {} failed: {:#}", arxiv_id, e);
                AppError::upstream("Error getting paper details", e)
            })?
            .ok_or_else(|| AppError::not_found("Paper not found"))?;

        Ok(PaperDetails::from(&paper))
    }
}
