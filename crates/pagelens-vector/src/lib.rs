//! PageLens Vector - document store and embeddings
//!
//! Provides an exact L2 vector index, a document store keeping ids,
//! texts and metadata aligned with the index rows, a lock-guarded shared
//! handle with on-disk persistence, and embedding providers.
//!
//! Author: hephaex@gmail.com

pub mod collection;
pub mod embedding;
pub mod index;
pub mod persist;
pub mod shared;
pub mod store;

pub use collection::{DocumentCollection, NamedCollection};
pub use embedding::{
    create_embedding_provider, EmbeddingProvider, HashEmbedding, OllamaEmbedding, OpenAiEmbedding,
};
pub use index::FlatL2Index;
pub use shared::{SharedDocumentStore, StorePaths};
pub use store::{QueryMatches, RecordRef, StoredRecord, VectorDocumentStore};
