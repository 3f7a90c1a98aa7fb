pub mod chunking;
pub mod extract;

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::{AppError, AppResult};
use crate::llm::embeddings::EmbeddingProvider;
use crate::session::{session_key, Session, SessionStore};
use chunking::{split_into_chunks, ChunkingConfig};

#[derive(Debug, Clone, Serialize)]
pub struct IngestedDocument {
    pub session_id: String,
    pub filename: String,
    pub text: String,
    pub chunks: Vec<String>,
    pub chunks_count: usize,
    pub text_length: usize,
}

/// Checks an upload name before any bytes are read.
pub fn validate_pdf_filename(filename: &str) -> AppResult<()> {
    if filename.trim().is_empty() {
        return Err(AppError::validation("No file selected"));
    }
    if !filename.to_lowercase().ends_with(".pdf") {
        return Err(AppError::validation("Invalid file type. Please upload a PDF file."));
    }
    Ok(())
}

/// Turns an uploaded PDF into a stored session: extract, chunk, embed, store.
pub struct DocumentService {
    sessions: Arc<dyn SessionStore>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    chunking: ChunkingConfig,
}

impl DocumentService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            sessions,
            embedder,
            chunking,
        }
    }

    pub async fn ingest_pdf(&self, filename: &str, bytes: Vec<u8>) -> AppResult<IngestedDocument> {
        validate_pdf_filename(filename)?;
        if bytes.is_empty() {
            return Err(AppError::validation("Uploaded file is empty"));
        }

        info!("Extracting text from {} ({} bytes)", filename, bytes.len());
        let text = extract::extract_pdf_text_blocking(bytes).await.map_err(|e| {
            error!("PDF extraction failed for {}: {:#}", filename, e);
            AppError::validation(format!("Could not extract text from PDF: {:#}", e))
        })?;

        self.ingest_text(filename, text).await
    }

    /// Chunks and embeds already extracted text and stores it as a session.
    pub async fn ingest_text(&self, filename: &str, text: String) -> AppResult<IngestedDocument> {
        if text.trim().is_empty() {
            return Err(AppError::validation("Could not extract text from PDF"));
        }

        let chunks = split_into_chunks(&text, &self.chunking);
        if chunks.is_empty() {
            return Err(AppError::validation("Document produced no text chunks"));
        }

        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| AppError::unavailable("No embedding model configured"))?;

        let embeddings = embedder.embed_batch(&chunks).await.map_err(|e| {
            error!("Embedding {} chunks failed: {:#}", chunks.len(), e);
            AppError::unavailable(format!("Embedding model unavailable: {:#}", e))
        })?;

        let key = session_key(filename, &text);
        let session = Session::new(filename, text.clone(), chunks.clone(), embeddings)?;
        self.sessions.insert(key.clone(), session);

        info!(
            "Stored session {} for {}: {} chunks, {} chars",
            key,
            filename,
            chunks.len(),
            text.chars().count()
        );

        Ok(IngestedDocument {
            session_id: key,
            filename: filename.to_string(),
            text_length: text.chars().count(),
            chunks_count: chunks.len(),
            text,
            chunks,
        })
    }

    pub fn session_text(&self, session_id: &str) -> AppResult<String> {
        Ok(self.sessions.require(session_id)?.text().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::InMemorySessionStore;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0])
        }

        fn model_name(&self) -> &str {
            "length"
        }
    }

    struct DownEmbedder;

    #[async_trait]
    impl EmbeddingProvider for DownEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(anyhow!("connection refused"))
        }

        fn model_name(&self) -> &str {
            "down"
        }
    }

    fn build(embedder: Option<Arc<dyn EmbeddingProvider>>) -> (DocumentService, Arc<InMemorySessionStore>) {
        let store = Arc::new(InMemorySessionStore::with_capacity(4));
        let chunking = ChunkingConfig::new(40, 10).unwrap();
        (DocumentService::new(store.clone(), embedder, chunking), store)
    }

    #[test]
    fn test_filename_rules() {
        assert!(validate_pdf_filename("paper.pdf").is_ok());
        assert!(validate_pdf_filename("PAPER.PDF").is_ok());
        assert!(matches!(validate_pdf_filename(""), Err(AppError::Validation(_))));
        assert!(matches!(validate_pdf_filename("notes.txt"), Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_ingest_text_stores_aligned_session() {
        let (service, store) = build(Some(Arc::new(LengthEmbedder)));
        let text = "word ".repeat(30);

        let doc = service.ingest_text("paper.pdf", text.clone()).await.unwrap();
        assert!(doc.chunks_count > 1);
        assert_eq!(doc.chunks.len(), doc.chunks_count);
        assert_eq!(doc.session_id, session_key("paper.pdf", &text));

        let session = store.get(&doc.session_id).unwrap();
        assert_eq!(session.chunks().len(), session.embeddings().len());
        assert_eq!(service.session_text(&doc.session_id).unwrap(), text);
    }

    #[tokio::test]
    async fn test_reupload_replaces_session() {
        let (service, store) = build(Some(Arc::new(LengthEmbedder)));
        let first = service.ingest_text("a.pdf", "same text".to_string()).await.unwrap();
        let second = service.ingest_text("a.pdf", "same text".to_string()).await.unwrap();
        assert_eq!(first.session_id, second.session_id);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_blank_text_is_rejected() {
        let (service, _) = build(Some(Arc::new(LengthEmbedder)));
        let err = service.ingest_text("a.pdf", "  \n ".to_string()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_missing_or_failing_embedder_is_unavailable() {
        let (service, store) = build(None);
        let err = service.ingest_text("a.pdf", "text".to_string()).await.unwrap_err();
        assert!(matches!(err, AppError::ServiceUnavailable(_)));

        let (service, _) = service_with_down();
        let err = service.ingest_text("a.pdf", "text".to_string()).await.unwrap_err();
        assert!(matches!(err, AppError::ServiceUnavailable(_)));
        assert!(store.is_empty());
    }

    fn service_with_down() -> (DocumentService, Arc<InMemorySessionStore>) {
        build(Some(Arc::new(DownEmbedder)))
    }

    #[tokio::test]
    async fn test_ingest_pdf_checks_name_and_bytes() {
        let (service, _) = build(Some(Arc::new(LengthEmbedder)));
        let err = service.ingest_pdf("a.docx", vec![1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = service.ingest_pdf("a.pdf", Vec::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_unknown_session_text() {
        let (service, _) = build(None);
        assert!(matches!(service.session_text("missing"), Err(AppError::NotFound(_))));
    }
}
