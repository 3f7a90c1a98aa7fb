use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::providers::traits::{CompletionProvider, CompletionRequest};

/// Tries each provider in order and returns the first successful completion.
/// If every provider fails, the last error is returned.
#[derive(Clone, Default)]
pub struct FallbackProvider {
    providers: Vec<Arc<dyn CompletionProvider>>,
}

impl FallbackProvider {
    pub fn new(providers: Vec<Arc<dyn CompletionProvider>>) -> Self {
        Self { providers }
    }

    pub fn push(&mut self, provider: Arc<dyn CompletionProvider>) {
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl CompletionProvider for FallbackProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let mut last_error = None;

        for (position, provider) in self.providers.iter().enumerate() {
            match provider.complete(request).await {
                Ok(text) => {
                    info!("Completion served by {}", provider.name());
                    return Ok(text);
                }
                Err(e) => {
                    if position + 1 < self.providers.len() {
                        warn!("{} failed, falling back: {:#}", provider.name(), e);
                    } else {
                        warn!("{} failed: {:#}", provider.name(), e);
                    }
                    last_error = Some(e.context(format!("{} completion failed", provider.name())));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("No generative provider configured")))
    }

    fn name(&self) -> &str {
        "fallback"
    }

    fn get_model_info(&self) -> String {
        self.providers
            .iter()
            .map(|p| p.get_model_info())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    fn is_available(&self) -> bool {
        !self.providers.is_empty()
    }
}
