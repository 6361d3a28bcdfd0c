//! PageLens RAG - Retrieval and chat orchestration
//!
//! This crate answers questions over the document store:
//! - Query embedding and nearest-record retrieval
//! - Deduplicated and ordinal-ordered document lists
//! - Grounded chat answers with the images of the matching page
//! - LLM clients and an embedding cache
//!
//! Author: hephaex@gmail.com

pub mod cache;
pub mod chat;
pub mod llm;
pub mod retrieval;

pub use cache::{CacheConfig, CacheStats, CacheStatsReport, CachedEmbeddingProvider};
pub use chat::{ChatAnswer, ChatOrchestrator, PromptBuilder, NO_CONTEXT_REPLY};
pub use llm::{create_llm_client, GeminiClient, OllamaClient, OpenAiClient};
pub use retrieval::{parse_ordinal, RetrievalService, RetrievedRecord, MISSING_ORDINAL};
