pub mod fallback;
pub mod gemini;
pub mod openai;
pub mod traits;

pub use fallback::FallbackProvider;
pub use traits::{ChatMessage, CompletionProvider, CompletionRequest, Role};
