use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One generation call: a role-tagged conversation, a token budget and a
/// sampling temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u16,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(system: &str, prompt: &str, max_tokens: u16, temperature: f32) -> Self {
        Self {
            messages: vec![ChatMessage::system(system), ChatMessage::user(prompt)],
            max_tokens,
            temperature,
        }
    }
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    fn name(&self) -> &str;

    fn get_model_info(&self) -> String;

    /// False when the provider cannot serve any request at all, e.g. an empty
    /// fallback chain.
    fn is_available(&self) -> bool {
        true
    }
}
