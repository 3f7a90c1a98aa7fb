use std::env;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::document::chunking::ChunkingConfig;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("CHUNK_OVERLAP ({overlap}) must be smaller than CHUNK_SIZE ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
    #[error("Unknown embedding provider: {0}")]
    UnknownEmbeddingProvider(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    OpenAI,
    Gemini,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub chat_model: String,
    pub embedding_model: String,
}

impl ProviderConfig {
    fn from_lookup(provider: &str, lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let prefix = provider.to_uppercase();

        let api_key = match provider {
            "gemini" => lookup("GOOGLE_API_KEY"),
            _ => lookup(&format!("{}_API_KEY", prefix)),
        }
        .filter(|key| !key.trim().is_empty());

        let api_url = lookup(&format!("{}_API_BASE", prefix)).unwrap_or_else(|| match provider {
            "openai" => "https://api.openai.com/v1".to_string(),
            "gemini" => "https://generativelanguage.googleapis.com/v1beta".to_string(),
            _ => String::new(),
        });

        let chat_model = lookup(&format!("{}_CHAT_MODEL", prefix))
            .or_else(|| lookup(&format!("{}_MODEL", prefix)))
            .unwrap_or_else(|| match provider {
                "openai" => "gpt-3.5-turbo".to_string(),
                "gemini" => "gemini-1.5-flash".to_string(),
                _ => String::new(),
            });

        let embedding_model = lookup(&format!("{}_EMBEDDING_MODEL", prefix))
            .unwrap_or_else(|| match provider {
                "openai" => "text-embedding-3-small".to_string(),
                "gemini" => "text-embedding-004".to_string(),
                _ => String::new(),
            });

        Self {
            api_key,
            api_url,
            chat_model,
            embedding_model,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub openai: ProviderConfig,
    pub gemini: ProviderConfig,
    pub embedding_backend: EmbeddingBackend,
    pub arxiv_api_url: String,
    pub metadata_timeout: Duration,
    pub chunking: ChunkingConfig,
    pub session_capacity: usize,
    pub default_search_category: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let openai = ProviderConfig::from_lookup("openai", &lookup);
        let gemini = ProviderConfig::from_lookup("gemini", &lookup);

        let embedding_backend = match lookup("EMBEDDING_PROVIDER") {
            Some(name) => match name.trim().to_lowercase().as_str() {
                "openai" => EmbeddingBackend::OpenAI,
                "gemini" | "google" => EmbeddingBackend::Gemini,
                other => return Err(ConfigError::UnknownEmbeddingProvider(other.to_string())),
            },
            None if openai.is_enabled() => EmbeddingBackend::OpenAI,
            None => EmbeddingBackend::Gemini,
        };

        let chunk_size = parse_or(&lookup, "CHUNK_SIZE", 5000usize)?;
        let chunk_overlap = parse_or(&lookup, "CHUNK_OVERLAP", 500usize)?;
        let chunking = ChunkingConfig::new(chunk_size, chunk_overlap)?;

        let session_capacity = parse_or(&lookup, "SESSION_CAPACITY", 256usize)?;
        if session_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SESSION_CAPACITY".to_string(),
                value: "0".to_string(),
            });
        }

        let arxiv_api_url = lookup("ARXIV_API_URL")
            .unwrap_or_else(|| "http://export.arxiv.org/api/query".to_string());
        if Url::parse(&arxiv_api_url).is_err() {
            return Err(ConfigError::InvalidValue {
                key: "ARXIV_API_URL".to_string(),
                value: arxiv_api_url,
            });
        }

        Ok(Self {
            openai,
            gemini,
            embedding_backend,
            arxiv_api_url,
            metadata_timeout: Duration::from_secs(parse_or(&lookup, "METADATA_TIMEOUT_SECS", 10u64)?),
            chunking,
            session_capacity,
            default_search_category: lookup("DEFAULT_SEARCH_CATEGORY")
                .unwrap_or_else(|| "cs.LG".to_string()),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(move |key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert!(!config.openai.is_enabled());
        assert!(!config.gemini.is_enabled());
        assert_eq!(config.openai.chat_model, "gpt-3.5-turbo");
        assert_eq!(config.gemini.embedding_model, "text-embedding-004");
        assert_eq!(config.embedding_backend, EmbeddingBackend::Gemini);
        assert_eq!(config.metadata_timeout, Duration::from_secs(10));
        assert_eq!(config.chunking.chunk_size(), 5000);
        assert_eq!(config.chunking.overlap(), 500);
        assert_eq!(config.session_capacity, 256);
        assert_eq!(config.default_search_category, "cs.LG");
    }

    #[test]
    fn test_openai_key_selects_openai_embeddings() {
        let config = config_from(&[("OPENAI_API_KEY", "sk-test")]).unwrap();
        assert!(config.openai.is_enabled());
        assert_eq!(config.embedding_backend, EmbeddingBackend::OpenAI);
    }

    #[test]
    fn test_explicit_embedding_provider() {
        let config = config_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("GOOGLE_API_KEY", "g-test"),
            ("EMBEDDING_PROVIDER", "Gemini"),
        ])
        .unwrap();
        assert_eq!(config.embedding_backend, EmbeddingBackend::Gemini);

        let err = config_from(&[("EMBEDDING_PROVIDER", "cohere")]).unwrap_err();
        assert_eq!(err, ConfigError::UnknownEmbeddingProvider("cohere".to_string()));
    }

    #[test]
    fn test_arxiv_url_must_parse() {
        let config = config_from(&[("ARXIV_API_URL", "http://localhost:9000/api/query")]).unwrap();
        assert_eq!(config.arxiv_api_url, "http://localhost:9000/api/query");

        let err = config_from(&[("ARXIV_API_URL", "not a url")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "ARXIV_API_URL"));
    }

    #[test]
    fn test_blank_key_is_disabled() {
        let config = config_from(&[("OPENAI_API_KEY", "  ")]).unwrap();
        assert!(!config.openai.is_enabled());
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let err = config_from(&[("CHUNK_SIZE", "big")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "CHUNK_SIZE"));

        let err = config_from(&[("CHUNK_SIZE", "100"), ("CHUNK_OVERLAP", "100")]).unwrap_err();
        assert_eq!(err, ConfigError::OverlapTooLarge { size: 100, overlap: 100 });

        assert!(config_from(&[("SESSION_CAPACITY", "0")]).is_err());
    }
}
