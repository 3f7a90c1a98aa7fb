use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use research_assistant::api::{self, AppState};
use research_assistant::config::{AppConfig, EmbeddingBackend};
use research_assistant::llm::EmbeddingProvider;
use research_assistant::papers::{ArxivClient, PaperIndex};
use research_assistant::providers::gemini::GeminiProvider;
use research_assistant::providers::openai::OpenAIProvider;
use research_assistant::providers::{CompletionProvider, FallbackProvider};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(long, default_value = "5000")]
    port: u16,
}

struct ProviderFactory {
    openai: Option<OpenAIProvider>,
    gemini: Option<GeminiProvider>,
}

impl ProviderFactory {
    fn new(config: &AppConfig) -> Self {
        Self {
            openai: OpenAIProvider::from_config(&config.openai),
            gemini: GeminiProvider::from_config(&config.gemini),
        }
    }

    /// Gemini first, OpenAI as backup.
    fn completion_chain(&self) -> FallbackProvider {
        let mut chain = FallbackProvider::default();
        if let Some(gemini) = &self.gemini {
            chain.push(Arc::new(gemini.clone()));
        }
        if let Some(openai) = &self.openai {
            chain.push(Arc::new(openai.clone()));
        }
        chain
    }

    fn embedder(&self, backend: EmbeddingBackend) -> Option<Arc<dyn EmbeddingProvider>> {
        match backend {
            EmbeddingBackend::OpenAI => self
                .openai
                .clone()
                .map(|p| Arc::new(p) as Arc<dyn EmbeddingProvider>),
            EmbeddingBackend::Gemini => self
                .gemini
                .clone()
                .map(|p| Arc::new(p) as Arc<dyn EmbeddingProvider>),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = AppConfig::from_env().context("Invalid configuration")?;

    let factory = ProviderFactory::new(&config);
    let chain = factory.completion_chain();
    if chain.is_empty() {
        warn!("No generative provider configured; set GOOGLE_API_KEY or OPENAI_API_KEY");
    } else {
        info!("Generation chain: {}", chain.get_model_info());
    }

    let embedder = factory.embedder(config.embedding_backend);
    match &embedder {
        Some(e) => info!("Embedding model: {}", e.model_name()),
        None => warn!(
            "Embedding backend {:?} has no API key; document QA and paper search are disabled",
            config.embedding_backend
        ),
    }

    let index: Arc<dyn PaperIndex> =
        Arc::new(ArxivClient::new(&config.arxiv_api_url, config.metadata_timeout)?);
    let state = AppState::new(&config, Arc::new(chain), embedder, index);
    let app = api::create_router(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", args.host, args.port))?;
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Server listening on {}", addr);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
