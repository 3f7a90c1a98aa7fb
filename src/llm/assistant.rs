//! Prompt construction for every generation operation.
//!
//! Each operation builds a system + user message pair with its own token
//! budget and temperature and sends it through one `CompletionProvider`,
//! normally the fallback chain.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::error::{AppError, AppResult};
use crate::providers::traits::{CompletionProvider, CompletionRequest};

const SUMMARY_INPUT_CHARS: usize = 8000;
const ANALYSIS_INPUT_CHARS: usize = 6000;
const REVIEW_MAX_PAPERS: usize = 10;

const SUMMARY_SYSTEM: &str = "You are an expert research assistant specializing in academic paper analysis and summarization. Always format output with proper markdown and LaTeX.";
const QA_SYSTEM: &str = "You are an expert research assistant.";
const STRUCTURE_SYSTEM: &str = "You are an expert at analyzing academic paper structure and content.";
const KEY_INFO_SYSTEM: &str = "You are an expert at extracting structured information from academic documents.";
const INSIGHTS_SYSTEM: &str = "You are an expert research analyst with deep knowledge across multiple academic domains.";
const QUESTIONS_SYSTEM: &str = "You are an expert at formulating research questions across various academic domains.";
const REVIEW_SYSTEM: &str = "You are an expert at writing comprehensive literature reviews.";
const TRENDS_SYSTEM: &str = "You are an expert at analyzing research trends and patterns across academic fields.";
const PROPOSAL_SYSTEM: &str = "You are an expert at writing research proposals and grant applications.";

/// Paper summary handed to the literature review prompt. Missing fields are
/// rendered as "Unknown".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReviewPaper {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub published_date: Option<String>,
}

/// The first `max_chars` characters of `text`, cut on a char boundary.
pub fn head(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn require(value: &str, field: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{} is required", field)));
    }
    Ok(())
}

pub struct ResearchAssistant {
    provider: Arc<dyn CompletionProvider>,
}

impl ResearchAssistant {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    pub fn model_info(&self) -> String {
        self.provider.get_model_info()
    }

    async fn generate(&self, operation: &str, request: CompletionRequest) -> AppResult<String> {
        if !self.provider.is_available() {
            return Err(AppError::unavailable("No generative provider configured"));
        }

        match self.provider.complete(&request).await {
            Ok(text) => {
                info!("{} completed ({} chars)", operation, text.len());
                Ok(text.trim().to_string())
            }
            Err(e) => {
                error!("{} failed: {:#}", operation, e);
                Err(AppError::upstream(&format!("Error during {}", operation), e))
            }
        }
    }

    pub async fn summarize(&self, text: &str) -> AppResult<String> {
        require(text, "Document text")?;
        let prompt = format!(
            r#"You are an AI assistant specializing in creating detailed summaries of academic documents for literature reviews.
Summarize the document following these guidelines:

1. Identify the main theories or concepts discussed.
2. Summarize the key findings from relevant studies.
3. Highlight areas of agreement or consensus in the research.
4. Summarize the methodologies used in the research.
5. Provide an overview of the potential implications of the research.
6. Suggest possible directions for future research based on the current literature.
7. If a model architecture is used, explain it step by step.
8. Describe and explain the key mathematical models, theorems or equations, each formatted in LaTeX as $equation$.

Document text:
{}

Format the output with markdown: ## for main sections, ### for subsections, * for bullet points and **bold** for emphasis."#,
            head(text, SUMMARY_INPUT_CHARS)
        );
        self.generate("summary", CompletionRequest::new(SUMMARY_SYSTEM, &prompt, 2000, 0.3))
            .await
    }

    /// Answers from the supplied chunks only; callers pass the top ranked
    /// chunks of a session.
    pub async fn answer_question(&self, question: &str, context_chunks: &[String]) -> AppResult<String> {
        require(question, "Question")?;
        let context = context_chunks.join("\n\n");
        let prompt = format!(
            r#"Use the provided context from research papers to answer the question as accurately as possible.
If the answer is not available in the context, respond with "The information is not available in the provided context."

Context: {}
Question: {}

Provide a clear, concise answer based on the context provided."#,
            context, question
        );
        self.generate("question answering", CompletionRequest::new(QA_SYSTEM, &prompt, 1000, 0.3))
            .await
    }

    pub async fn analyze_structure(&self, text: &str) -> AppResult<String> {
        require(text, "Paper text")?;
        let prompt = format!(
            r#"Analyze the structure and key components of this research paper. Identify:

1. Paper title and authors
2. Abstract and main objective
3. Introduction and background
4. Methodology and approach
5. Key findings and results
6. Conclusions and implications
7. References and citations
8. Research contributions
9. Limitations and future work
10. Keywords and topics

Paper text:
{}

Provide a structured analysis with clear sections and bullet points."#,
            head(text, ANALYSIS_INPUT_CHARS)
        );
        self.generate("structure analysis", CompletionRequest::new(STRUCTURE_SYSTEM, &prompt, 2000, 0.3))
            .await
    }

    pub async fn extract_key_information(&self, text: &str) -> AppResult<String> {
        require(text, "Document text")?;
        let prompt = format!(
            r#"Extract key information from this academic document and return it in a structured format.
Identify:
1. Title of the paper
2. Authors (if mentioned)
3. Abstract or main objective
4. Key methodologies used
5. Main findings or results
6. Keywords or key terms
7. Publication year (if mentioned)
8. Research field or domain

Document text:
{}"#,
            head(text, ANALYSIS_INPUT_CHARS)
        );
        self.generate("key information extraction", CompletionRequest::new(KEY_INFO_SYSTEM, &prompt, 1500, 0.2))
            .await
    }

    pub async fn research_insights(&self, topic: &str, context: &str) -> AppResult<String> {
        require(topic, "Topic")?;
        let prompt = format!(
            r#"Provide comprehensive insights about the research topic: "{}"

Cover:
1. Current state of research in this area
2. Key challenges and opportunities
3. Emerging trends and technologies
4. Potential research directions
5. Important papers or researchers to follow
6. Practical applications and implications

Additional context: {}

Provide a well-structured analysis with specific examples and actionable insights."#,
            topic, context
        );
        self.generate("research insights", CompletionRequest::new(INSIGHTS_SYSTEM, &prompt, 2000, 0.7))
            .await
    }

    pub async fn research_questions(&self, topic: &str, context: &str) -> AppResult<String> {
        require(topic, "Topic")?;
        let prompt = format!(
            r#"Generate research questions for the topic: "{}"

Include fundamental, applied, methodological, theoretical, practical implementation and future-oriented questions.

Additional context: {}

For each question give the question itself, why it matters, potential approaches to answer it and the expected impact.
Generate 10-15 high-quality research questions."#,
            topic, context
        );
        self.generate("research questions", CompletionRequest::new(QUESTIONS_SYSTEM, &prompt, 2000, 0.6))
            .await
    }

    pub async fn literature_review(&self, topic: &str, papers: &[ReviewPaper]) -> AppResult<String> {
        require(topic, "Topic")?;
        if papers.is_empty() {
            return Err(AppError::validation("At least one paper is required"));
        }

        let papers_text = papers
            .iter()
            .take(REVIEW_MAX_PAPERS)
            .enumerate()
            .map(|(i, paper)| {
                format!(
                    "Paper {}: {}\nAuthors: {}\nAbstract: {}\nPublished: {}",
                    i + 1,
                    paper.title.as_deref().unwrap_or("Unknown"),
                    paper.authors.as_deref().unwrap_or("Unknown"),
                    paper.abstract_text.as_deref().unwrap_or("No abstract available"),
                    paper.published_date.as_deref().unwrap_or("Unknown"),
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = format!(
            r#"Create a comprehensive literature review for the topic: "{}"

Based on the following papers, provide:
1. Introduction and background
2. Current state of research
3. Key findings and methodologies
4. Gaps in existing research
5. Future research directions
6. Conclusions

Papers to review:
{}

Write a well-structured literature review that synthesizes the key findings and identifies research opportunities."#,
            topic, papers_text
        );
        self.generate("literature review", CompletionRequest::new(REVIEW_SYSTEM, &prompt, 2500, 0.4))
            .await
    }

    pub async fn research_trends(&self, field: &str, time_period: &str) -> AppResult<String> {
        require(field, "Field")?;
        let period = if time_period.trim().is_empty() { "recent" } else { time_period.trim() };
        let prompt = format!(
            r#"Analyze research trends in the field: "{}" for the {} period.

Cover:
1. Emerging topics and themes
2. Popular methodologies and approaches
3. Key breakthroughs and innovations
4. Challenges and limitations
5. Future directions and opportunities
6. Notable researchers and institutions
7. Impact on industry and society
8. Funding and collaboration trends

Provide a comprehensive analysis with specific examples where possible."#,
            field, period
        );
        self.generate("trend analysis", CompletionRequest::new(TRENDS_SYSTEM, &prompt, 2000, 0.5))
            .await
    }

    pub async fn research_proposal(&self, topic: &str, objectives: &[String]) -> AppResult<String> {
        require(topic, "Topic")?;
        let objectives_text = objectives
            .iter()
            .map(|o| format!("- {}", o))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            r#"Generate a research proposal outline for the topic: "{}"

Research objectives:
{}

Include: executive summary, introduction and background, problem statement, research objectives, literature review, methodology, expected outcomes, timeline and milestones, budget considerations, risk assessment and references."#,
            topic, objectives_text
        );
        self.generate("research proposal", CompletionRequest::new(PROPOSAL_SYSTEM, &prompt, 2500, 0.4))
            .await
    }
}
