use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::ProviderConfig;
use crate::llm::embeddings::EmbeddingProvider;
use crate::providers::traits::{CompletionProvider, CompletionRequest, Role};

#[derive(Clone)]
pub struct GeminiProvider {
    api_key: String,
    api_base: String,
    client: Client,
    model: String,
    embedding_model: String,
}

impl GeminiProvider {
    pub fn new(api_key: &str, api_base: &str, model: &str, embedding_model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            client: Client::new(),
            model: model.to_string(),
            embedding_model: embedding_model.to_string(),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Option<Self> {
        config.api_key.as_deref().map(|key| {
            Self::new(key, &config.api_url, &config.chat_model, &config.embedding_model)
        })
    }

    fn request_body(request: &CompletionRequest) -> Value {
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let contents: Vec<Value> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| json!({ "role": "user", "parts": [{ "text": m.content }] }))
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": request.max_tokens,
                "temperature": request.temperature,
            }
        });

        if !system.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system.join("\n") }] });
        }
        body
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .context("Gemini returned a non-JSON body")?;

        if !status.is_success() {
            let message = payload["error"]["message"].as_str().unwrap_or("unknown error");
            return Err(anyhow!("Gemini API error ({}): {}", status, message));
        }
        Ok(payload)
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);
        let response_json = self.post(&url, &Self::request_body(request)).await?;

        response_json["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("Invalid response format"))
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn get_model_info(&self) -> String {
        self.model.clone()
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/models/{}:embedContent", self.api_base, self.embedding_model);
        let body = json!({
            "model": format!("models/{}", self.embedding_model),
            "content": { "parts": [{ "text": text }] }
        });
        let response_json = self.post(&url, &body).await?;

        let values = response_json["embedding"]["values"]
            .as_array()
            .ok_or_else(|| anyhow!("Invalid embedding response format"))?;

        values
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| anyhow!("Non-numeric embedding value"))
            })
            .collect()
    }

    fn model_name(&self) -> &str {
        &self.embedding_model
    }
}
