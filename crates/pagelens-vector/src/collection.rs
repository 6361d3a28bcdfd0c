//! Named collection facade over the shared store

use crate::shared::SharedDocumentStore;
use crate::store::QueryMatches;
use async_trait::async_trait;
use pagelens_core::{Metadata, Result};

/// Collection-style access to stored records
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// Collection name
    fn name(&self) -> &str;

    /// Append records
    async fn add(
        &self,
        documents: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        ids: Vec<String>,
        metadatas: Option<Vec<Metadata>>,
    ) -> Result<()>;

    /// Nearest-neighbour search
    async fn query(
        &self,
        query_embeddings: &[Vec<f32>],
        n_results: usize,
    ) -> Result<Vec<QueryMatches>>;

    /// Delete records by id, returning how many were removed
    async fn delete(&self, ids: &[String]) -> Result<usize>;

    /// Number of records
    async fn count(&self) -> usize;
}

/// A named view onto a [`SharedDocumentStore`]
///
/// Writes through this handle are persisted immediately.
#[derive(Debug, Clone)]
pub struct NamedCollection {
    name: String,
    store: SharedDocumentStore,
}

impl NamedCollection {
    pub fn new(name: impl Into<String>, store: SharedDocumentStore) -> Self {
        Self {
            name: name.into(),
            store,
        }
    }

    /// Underlying store handle
    pub fn store(&self) -> &SharedDocumentStore {
        &self.store
    }
}

#[async_trait]
impl DocumentCollection for NamedCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn add(
        &self,
        documents: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        ids: Vec<String>,
        metadatas: Option<Vec<Metadata>>,
    ) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.store
            .add_and_persist(documents, embeddings, ids, metadatas)
            .await
    }

    async fn query(
        &self,
        query_embeddings: &[Vec<f32>],
        n_results: usize,
    ) -> Result<Vec<QueryMatches>> {
        self.store.query(query_embeddings, n_results).await
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        self.store.delete_and_persist(ids).await
    }

    async fn count(&self) -> usize {
        self.store.count().await
    }
}
