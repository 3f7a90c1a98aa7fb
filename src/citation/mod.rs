//! Citation formatting and bibliography generation for arXiv papers.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};
use crate::papers::{
    normalize_identifier, PaperDetails, PaperIndex, PaperRecord, MAX_CONCURRENT_LOOKUPS,
};

pub const MAX_BIBLIOGRAPHY_ITEMS: usize = 20;
const UNKNOWN_AUTHOR: &str = "Unknown Author";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CitationStyle {
    #[serde(rename = "APA")]
    Apa,
    #[serde(rename = "MLA")]
    Mla,
    Chicago,
    #[serde(rename = "IEEE")]
    Ieee,
}

impl FromStr for CitationStyle {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "apa" => Ok(CitationStyle::Apa),
            "mla" => Ok(CitationStyle::Mla),
            "chicago" => Ok(CitationStyle::Chicago),
            "ieee" => Ok(CitationStyle::Ieee),
            other => Err(AppError::validation(format!(
                "Unsupported citation style: {}. Use APA, MLA, Chicago or IEEE",
                other
            ))),
        }
    }
}

impl fmt::Display for CitationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CitationStyle::Apa => "APA",
            CitationStyle::Mla => "MLA",
            CitationStyle::Chicago => "Chicago",
            CitationStyle::Ieee => "IEEE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CitationRecord {
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub arxiv_id: String,
}

impl From<&PaperRecord> for CitationRecord {
    fn from(paper: &PaperRecord) -> Self {
        Self {
            title: paper.title.clone(),
            authors: paper.authors.clone(),
            year: paper.year(),
            arxiv_id: paper.arxiv_id.clone(),
        }
    }
}

struct NameParts<'a> {
    first: &'a str,
    last: &'a str,
    single: bool,
}

fn name_parts(name: &str) -> NameParts<'_> {
    let mut tokens = name.split_whitespace();
    let first = tokens.next().unwrap_or_default();
    match tokens.last() {
        Some(last) => NameParts { first, last, single: false },
        None => NameParts { first, last: first, single: true },
    }
}

fn initial(name: &str) -> String {
    name.chars().next().map(|c| c.to_string()).unwrap_or_default()
}

fn last_comma_initial(name: &str) -> String {
    let parts = name_parts(name);
    if parts.single {
        return parts.first.to_string();
    }
    format!("{}, {}.", parts.last, initial(parts.first))
}

fn last_comma_first(name: &str) -> String {
    let parts = name_parts(name);
    if parts.single {
        return parts.first.to_string();
    }
    format!("{}, {}", parts.last, parts.first)
}

fn initial_last(name: &str) -> String {
    let parts = name_parts(name);
    if parts.single {
        return parts.first.to_string();
    }
    format!("{}. {}", initial(parts.first), parts.last)
}

fn apa_authors(names: &[String]) -> String {
    let formatted: Vec<String> = names.iter().map(|n| last_comma_initial(n)).collect();
    match formatted.as_slice() {
        [] => UNKNOWN_AUTHOR.to_string(),
        [one] => one.clone(),
        [a, b] => format!("{} & {}", a, b),
        [rest @ .., last] => format!("{}, & {}", rest.join(", "), last),
    }
}

fn joined_authors(names: &[String], form: fn(&str) -> String, separator: &str) -> String {
    if names.is_empty() {
        return UNKNOWN_AUTHOR.to_string();
    }
    names
        .iter()
        .map(|n| form(n))
        .collect::<Vec<_>>()
        .join(separator)
}

/// Formats one record. Deterministic: the same record and style always give
/// the same string.
pub fn format_citation(record: &CitationRecord, style: CitationStyle) -> String {
    let title = record.title.split_whitespace().collect::<Vec<_>>().join(" ");
    let year = record
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "n.d.".to_string());
    let url = format!("https://arxiv.org/abs/{}", record.arxiv_id);
    let names: Vec<String> = record
        .authors
        .iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect();

    match style {
        CitationStyle::Apa => {
            format!("{} ({}). {}. arXiv. {}", apa_authors(&names), year, title, url)
        }
        CitationStyle::Mla => format!(
            "{}. \"{}.\" arXiv, {}, {}.",
            joined_authors(&names, last_comma_first, ", and "),
            title,
            year,
            url
        ),
        CitationStyle::Chicago => format!(
            "{}. \"{}.\" {}. arXiv. {}.",
            joined_authors(&names, last_comma_first, " and "),
            title,
            year,
            url
        ),
        CitationStyle::Ieee => format!(
            "{}, \"{},\" arXiv, {}. [Online]. Available: {}.",
            joined_authors(&names, initial_last, ", "),
            title,
            year,
            url
        ),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GeneratedCitation {
    pub citation: String,
    pub style: CitationStyle,
    pub paper_title: String,
    pub authors: Vec<String>,
    pub arxiv_id: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BibliographyReport {
    pub success: bool,
    pub bibliography: String,
    pub style: CitationStyle,
    pub total_papers: usize,
    pub successful_citations: usize,
    pub failed_papers: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DownloadPayload {
    pub download_text: String,
    pub filename: String,
}

pub struct CitationService {
    index: Arc<dyn PaperIndex>,
}

impl CitationService {
    pub fn new(index: Arc<dyn PaperIndex>) -> Self {
        Self { index }
    }

    async fn lookup(&self, identifier: &str) -> AppResult<PaperRecord> {
        let arxiv_id = normalize_identifier(identifier)?;
        self.index
            .fetch(&arxiv_id)
            .await
            .map_err(|e| {
                error!("Error fetching arXiv data for {}: {:#}", arxiv_id, e);
                AppError::upstream("Error fetching arXiv data", e)
            })?
            .ok_or_else(|| {
                AppError::not_found("Could not fetch paper data from arXiv. Please check the URL.")
            })
    }

    pub async fn generate_citation(
        &self,
        identifier: &str,
        style: CitationStyle,
    ) -> AppResult<GeneratedCitation> {
        let paper = self.lookup(identifier).await?;
        let citation = format_citation(&CitationRecord::from(&paper), style);
        info!("Generated {} citation for {}", style, paper.arxiv_id);

        Ok(GeneratedCitation {
            citation,
            style,
            paper_title: paper.title,
            authors: paper.authors,
            arxiv_id: paper.arxiv_id,
            generated_at: Utc::now(),
        })
    }

    /// Cites every identifier, in input order, with at most
    /// `MAX_CONCURRENT_LOOKUPS` fetches in flight. Individual failures are
    /// collected rather than aborting the whole batch.
    pub async fn generate_bibliography(
        &self,
        identifiers: &[String],
        style: CitationStyle,
    ) -> AppResult<BibliographyReport> {
        if identifiers.is_empty() {
            return Err(AppError::validation("ArXiv URLs are required"));
        }
        if identifiers.len() > MAX_BIBLIOGRAPHY_ITEMS {
            return Err(AppError::validation(format!(
                "Maximum {} papers allowed for bibliography",
                MAX_BIBLIOGRAPHY_ITEMS
            )));
        }

        let lookups: Vec<_> = identifiers
            .iter()
            .map(|identifier| self.generate_citation(identifier, style))
            .collect();
        let results: Vec<AppResult<GeneratedCitation>> = stream::iter(lookups)
            .buffered(MAX_CONCURRENT_LOOKUPS)
            .collect()
            .await;

        let mut citations = Vec::new();
        let mut failed_papers = Vec::new();
        for (position, result) in results.into_iter().enumerate() {
            match result {
                Ok(generated) => citations.push(generated.citation),
                Err(e) => failed_papers.push(format!("Paper {}: {}", position + 1, e)),
            }
        }

        if !failed_papers.is_empty() {
            warn!(
                "Bibliography: {} of {} papers failed",
                failed_papers.len(),
                identifiers.len()
            );
        }

        Ok(BibliographyReport {
            success: !citations.is_empty(),
            total_papers: identifiers.len(),
            successful_citations: citations.len(),
            bibliography: citations.join("\n\n"),
            style,
            failed_papers,
            generated_at: Utc::now(),
        })
    }

    pub async fn paper_metadata(&self, identifier: &str) -> AppResult<PaperDetails> {
        let paper = self.lookup(identifier).await?;
        Ok(PaperDetails::from(&paper))
    }
}

pub fn download_payload(citation: &str, style: CitationStyle) -> AppResult<DownloadPayload> {
    if citation.trim().is_empty() {
        return Err(AppError::validation("Citation text is required"));
    }
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    Ok(DownloadPayload {
        download_text: citation.to_string(),
        filename: format!("citation_{}_{}.txt", style.to_string().to_lowercase(), timestamp),
    })
}
