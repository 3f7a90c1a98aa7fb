use anyhow::{anyhow, Result};
use async_trait::async_trait;

/// A sentence-embedding model. The same input must always produce the same
/// vector, and every vector from one provider has the same length.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embeds several texts; the output is in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    fn model_name(&self) -> &str;
}

/// Checks a batch response against the request before it is trusted.
pub fn ensure_batch_len(embeddings: &[Vec<f32>], expected: usize) -> Result<()> {
    if embeddings.len() != expected {
        return Err(anyhow!(
            "Embedding batch returned {} vectors for {} inputs",
            embeddings.len(),
            expected
        ));
    }
    Ok(())
}
