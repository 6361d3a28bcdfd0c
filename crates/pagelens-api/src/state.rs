//! Application state management
//!
//! Author: hephaex@gmail.com

use pagelens_core::config::AppConfig;
use pagelens_core::{LlmClient, Result};
use pagelens_ingest::IngestionPipeline;
use pagelens_rag::{
    create_llm_client, CachedEmbeddingProvider, ChatOrchestrator, PromptBuilder, RetrievalService,
};
use pagelens_vector::{
    create_embedding_provider, EmbeddingProvider, SharedDocumentStore, StorePaths,
};
use std::sync::Arc;
use std::time::Instant;

/// Collection name used for every request
pub const COLLECTION_NAME: &str = "pagelens";

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Document store
    pub store: SharedDocumentStore,
    /// Query-time retrieval
    pub retrieval: RetrievalService,
    /// Chat orchestrator, absent when no LLM is configured
    pub chat: Option<ChatOrchestrator>,
    /// Ingestion and removal
    pub ingest: IngestionPipeline,
}

impl AppState {
    /// Assemble state from already constructed components
    pub fn new(
        config: AppConfig,
        store: SharedDocumentStore,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Option<Arc<dyn LlmClient>>,
    ) -> Result<Self> {
        let collection = Arc::new(store.get_or_create_collection(COLLECTION_NAME));
        let retrieval = RetrievalService::new(collection, Arc::clone(&embedder));

        let chat = match llm {
            Some(llm) => Some(
                ChatOrchestrator::new(retrieval.clone(), llm, store.clone())
                    .with_top_k(config.retrieval.chat_top_k)
                    .with_prompt(PromptBuilder::from_config(&config.llm)?),
            ),
            None => None,
        };

        let ingest = IngestionPipeline::new(store.clone(), embedder);

        Ok(Self {
            config,
            start_time: Instant::now(),
            store,
            retrieval,
            chat,
            ingest,
        })
    }

    /// Open the configured store and providers
    ///
    /// A missing LLM configuration disables chat instead of failing startup.
    /// An embedder whose dimension differs from the stored index is a
    /// configuration error.
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        let store = SharedDocumentStore::open(StorePaths::from(&config.store))?;

        let provider: Arc<dyn EmbeddingProvider> =
            Arc::from(create_embedding_provider(&config.embedding)?);
        store.ensure_dimension(provider.dimension()).await?;
        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::new(CachedEmbeddingProvider::new(provider));

        let llm: Option<Arc<dyn LlmClient>> = match create_llm_client(&config.llm) {
            Ok(client) => Some(Arc::from(client)),
            Err(e) => {
                tracing::warn!(error = %e, "LLM not configured, chat disabled");
                None
            }
        };

        tracing::info!(
            records = store.count().await,
            embedding = embedder.model_id(),
            chat = llm.is_some(),
            "Application state ready"
        );
        Self::new(config, store, embedder, llm)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
