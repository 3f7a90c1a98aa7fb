pub mod assistant;
pub mod embeddings;
pub mod semantic_search;

pub use assistant::ResearchAssistant;
pub use embeddings::EmbeddingProvider;
pub use semantic_search::{SearchResult, SemanticSearch};
