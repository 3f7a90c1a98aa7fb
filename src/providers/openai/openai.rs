use anyhow::{anyhow, Context, Result};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs,
        CreateEmbeddingRequestArgs, EmbeddingInput, Role as OpenAIRole,
    },
    Client,
};
use async_trait::async_trait;

use crate::config::ProviderConfig;
use crate::llm::embeddings::{ensure_batch_len, EmbeddingProvider};
use crate::providers::traits::{ChatMessage, CompletionProvider, CompletionRequest, Role};

// Inputs per embeddings request.
const EMBEDDING_BATCH_SIZE: usize = 64;

#[derive(Clone)]
pub struct OpenAIProvider {
    client: Client<OpenAIConfig>,
    chat_model: String,
    embedding_model: String,
}

impl OpenAIProvider {
    pub fn new(api_key: &str, api_base: &str, chat_model: &str, embedding_model: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base.trim_end_matches('/'));

        Self {
            client: Client::with_config(config),
            chat_model: chat_model.to_string(),
            embedding_model: embedding_model.to_string(),
        }
    }

    /// Builds the provider from config, or `None` when no key is set.
    pub fn from_config(config: &ProviderConfig) -> Option<Self> {
        config.api_key.as_deref().map(|key| {
            Self::new(key, &config.api_url, &config.chat_model, &config.embedding_model)
        })
    }

    fn to_request_message(message: &ChatMessage) -> ChatCompletionRequestMessage {
        match message.role {
            Role::System => ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                role: OpenAIRole::System,
                content: message.content.clone(),
                name: None,
            }),
            Role::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                role: OpenAIRole::User,
                content: ChatCompletionRequestUserMessageContent::Text(message.content.clone()),
                name: None,
            }),
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = request
            .messages
            .iter()
            .map(Self::to_request_message)
            .collect();

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.chat_model)
            .messages(messages)
            .max_tokens(request.max_tokens)
            .temperature(request.temperature)
            .build()?;

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .context("OpenAI chat request failed")?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| anyhow!("No response content"))
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn get_model_info(&self) -> String {
        self.chat_model.clone()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| anyhow!("No embedding returned from OpenAI"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all = Vec::with_capacity(texts.len());

        for batch in texts.chunks(EMBEDDING_BATCH_SIZE) {
            let request = CreateEmbeddingRequestArgs::default()
                .model(&self.embedding_model)
                .input(EmbeddingInput::StringArray(batch.to_vec()))
                .build()?;

            let response = self
                .client
                .embeddings()
                .create(request)
                .await
                .context("OpenAI embeddings request failed")?;

            let mut data = response.data;
            data.sort_by_key(|embedding| embedding.index);
            let vectors: Vec<Vec<f32>> = data.into_iter().map(|e| e.embedding).collect();
            ensure_batch_len(&vectors, batch.len())?;
            all.extend(vectors);
        }

        Ok(all)
    }

    fn model_name(&self) -> &str {
        &self.embedding_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> OpenAIProvider {
        OpenAIProvider::new("sk-test", &server.uri(), "gpt-3.5-turbo", "text-embedding-3-small")
    }

    #[tokio::test]
    async fn test_complete_sends_messages_and_budget() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-3.5-turbo",
                "max_tokens": 1000,
                "messages": [
                    {"role": "system", "content": "You are an expert research assistant."},
                    {"role": "user", "content": "What is attention?"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "created": 1700000000,
                "model": "gpt-3.5-turbo",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "  A weighting mechanism.  "},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = CompletionRequest::new(
            "You are an expert research assistant.",
            "What is attention?",
            1000,
            0.3,
        );
        let answer = provider(&server).complete(&request).await.unwrap();
        assert_eq!(answer, "A weighting mechanism.");
    }

    #[tokio::test]
    async fn test_complete_surfaces_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {
                    "message": "Incorrect API key provided",
                    "type": "invalid_request_error",
                    "param": null,
                    "code": "invalid_api_key"
                }
            })))
            .mount(&server)
            .await;

        let request = CompletionRequest::new("s", "p", 10, 0.1);
        assert!(provider(&server).complete(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_embed_batch_orders_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "model": "text-embedding-3-small",
                "data": [
                    {"object": "embedding", "index": 1, "embedding": [0.0, 1.0]},
                    {"object": "embedding", "index": 0, "embedding": [1.0, 0.0]}
                ],
                "usage": {"prompt_tokens": 4, "total_tokens": 4}
            })))
            .mount(&server)
            .await;

        let vectors = provider(&server)
            .embed_batch(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_embed_batch_rejects_short_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "model": "text-embedding-3-small",
                "data": [{"object": "embedding", "index": 0, "embedding": [1.0]}],
                "usage": {"prompt_tokens": 4, "total_tokens": 4}
            })))
            .mount(&server)
            .await;

        let result = provider(&server)
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_disabled_without_key() {
        let config = ProviderConfig {
            api_key: None,
            api_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-3.5-turbo".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
        };
        assert!(OpenAIProvider::from_config(&config).is_none());
    }
}
