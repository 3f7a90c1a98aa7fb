//! Academic paper index abstraction and the shared paper record.

pub mod arxiv;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{AppError, AppResult};

pub use arxiv::ArxivClient;

/// Upper bound on index lookups in flight for one batch operation. arXiv
/// throttles clients that fan out wide.
pub const MAX_CONCURRENT_LOOKUPS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaperRecord {
    /// arXiv identifier including any version suffix, e.g. `1706.03762v7`.
    pub arxiv_id: String,
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub summary: String,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub categories: Vec<String>,
    pub abs_url: String,
    pub pdf_url: Option<String>,
    pub doi: Option<String>,
    pub journal_ref: Option<String>,
}

impl PaperRecord {
    pub fn published_date(&self) -> Option<String> {
        self.published.map(|d| d.format("%Y-%m-%d").to_string())
    }

    pub fn updated_date(&self) -> Option<String> {
        self.updated.map(|d| d.format("%Y-%m-%d").to_string())
    }

    pub fn year(&self) -> Option<i32> {
        use chrono::Datelike;
        self.published.map(|d| d.year())
    }
}

/// Wire shape of a full paper record, dates rendered as `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaperDetails {
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub summary: String,
    pub arxiv_id: String,
    pub published_date: Option<String>,
    pub updated_date: Option<String>,
    pub categories: Vec<String>,
    pub pdf_url: Option<String>,
    pub abs_url: String,
    pub doi: Option<String>,
    pub journal_ref: Option<String>,
}

impl From<&PaperRecord> for PaperDetails {
    fn from(paper: &PaperRecord) -> Self {
        Self {
            title: paper.title.clone(),
            authors: paper.authors.clone(),
            summary: paper.summary.clone(),
            arxiv_id: paper.arxiv_id.clone(),
            published_date: paper.published_date(),
            updated_date: paper.updated_date(),
            categories: paper.categories.clone(),
            pdf_url: paper.pdf_url.clone(),
            abs_url: paper.abs_url.clone(),
            doi: paper.doi.clone(),
            journal_ref: paper.journal_ref.clone(),
        }
    }
}

#[async_trait]
pub trait PaperIndex: Send + Sync {
    /// Papers matching `query`, optionally restricted to one category.
    async fn search(
        &self,
        query: &str,
        category: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<PaperRecord>>;

    /// The record for one identifier, `None` when the index has no such paper.
    async fn fetch(&self, arxiv_id: &str) -> Result<Option<PaperRecord>>;
}

/// Reduces an arXiv URL or bare identifier to the identifier itself.
///
/// Accepts `https://arxiv.org/abs/ID`, `https://arxiv.org/pdf/ID(.pdf)` and
/// bare new-style (`1706.03762v7`) or old-style (`hep-th/9901001`) ids.
pub fn normalize_identifier(input: &str) -> AppResult<String> {
    let trimmed = input.trim();
    let without_suffix = trimmed
        .split(|c| c == '?' || c == '#')
        .next()
        .unwrap_or_default();

    let id = if let Some((_, rest)) = without_suffix.split_once("/abs/") {
        rest
    } else if let Some((_, rest)) = without_suffix.split_once("/pdf/") {
        rest.strip_suffix(".pdf").unwrap_or(rest)
    } else if without_suffix.contains("://") {
        without_suffix.rsplit('/').next().unwrap_or_default()
    } else {
        without_suffix.strip_prefix("arXiv:").unwrap_or(without_suffix)
    };

    let id = id.trim().trim_end_matches('/');
    if id.is_empty() {
        return Err(AppError::validation("arXiv URL or identifier is required"));
    }
    Ok(id.to_string())
}
