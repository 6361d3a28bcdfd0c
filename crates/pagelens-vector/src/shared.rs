//! Shared, lock-guarded handle to a persisted document store
//!
//! Readers (`query`, `count`, prefix scans) share a read lock. Mutations and
//! saves take the write lock, so no reader observes a half-applied batch or
//! a half-rebuilt index.

use crate::collection::NamedCollection;
use crate::store::{QueryMatches, RecordRef, StoredRecord, VectorDocumentStore};
use pagelens_core::{Metadata, PageLensError, Result, StoreConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Where the store is persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub index_path: PathBuf,
    pub metadata_path: PathBuf,
}

impl From<&StoreConfig> for StorePaths {
    fn from(config: &StoreConfig) -> Self {
        Self {
            index_path: config.index_path(),
            metadata_path: config.metadata_path(),
        }
    }
}

/// Cloneable handle to one document store
#[derive(Debug, Clone)]
pub struct SharedDocumentStore {
    inner: Arc<RwLock<VectorDocumentStore>>,
    paths: StorePaths,
}

impl SharedDocumentStore {
    /// Wrap an already loaded store
    pub fn new(store: VectorDocumentStore, paths: StorePaths) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
            paths,
        }
    }

    /// Load the store persisted at `paths`, or start empty
    pub fn open(paths: StorePaths) -> Result<Self> {
        let store = VectorDocumentStore::load(&paths.index_path, &paths.metadata_path)?;
        Ok(Self::new(store, paths))
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Append a batch of records (not persisted until [`Self::persist`])
    pub async fn add(
        &self,
        documents: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        ids: Vec<String>,
        metadatas: Option<Vec<Metadata>>,
    ) -> Result<()> {
        let mut store = self.inner.write().await;
        store.add(documents, embeddings, ids, metadatas)
    }

    /// Append a batch and save it under one write guard
    ///
    /// The batch is applied to a staged copy that replaces the live store
    /// only once the save succeeds, so a failed save leaves memory and disk
    /// agreeing on the previous state.
    pub async fn add_and_persist(
        &self,
        documents: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        ids: Vec<String>,
        metadatas: Option<Vec<Metadata>>,
    ) -> Result<()> {
        let mut store = self.inner.write().await;
        let mut staged = store.clone();
        staged.add(documents, embeddings, ids, metadatas)?;
        self.commit(&mut store, staged)
    }

    pub async fn query(
        &self,
        query_embeddings: &[Vec<f32>],
        n_results: usize,
    ) -> Result<Vec<QueryMatches>> {
        let store = self.inner.read().await;
        store.query(query_embeddings, n_results)
    }

    /// Delete records by id and save, under one write guard
    ///
    /// Nothing is written when no id matched.
    pub async fn delete_and_persist(&self, ids: &[String]) -> Result<usize> {
        let mut store = self.inner.write().await;
        let mut staged = store.clone();
        let removed = staged.delete(ids)?;
        if removed > 0 {
            self.commit(&mut store, staged)?;
        }
        Ok(removed)
    }

    /// Delete every record accepted by `predicate`, then persist
    pub async fn delete_matching<F>(&self, predicate: F) -> Result<usize>
    where
        F: Fn(&RecordRef<'_>) -> bool,
    {
        let mut store = self.inner.write().await;
        let doomed: Vec<String> = store
            .records()
            .filter(|record| predicate(record))
            .map(|record| record.id.to_string())
            .collect();
        if doomed.is_empty() {
            return Ok(0);
        }

        let mut staged = store.clone();
        let removed = staged.delete(&doomed)?;
        self.commit(&mut store, staged)?;
        tracing::info!(removed, "Deleted matching records");
        Ok(removed)
    }

    /// Save the current state to the configured paths
    pub async fn persist(&self) -> Result<()> {
        // Write lock so no mutation interleaves with the two-file save.
        let store = self.inner.write().await;
        store.save(&self.paths.index_path, &self.paths.metadata_path)
    }

    fn commit(&self, live: &mut VectorDocumentStore, staged: VectorDocumentStore) -> Result<()> {
        staged.save(&self.paths.index_path, &self.paths.metadata_path)?;
        *live = staged;
        Ok(())
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.count()
    }

    pub async fn dimension(&self) -> Option<usize> {
        self.inner.read().await.dimension()
    }

    /// Fail when an embedder of `dimension` cannot search the stored index
    ///
    /// An empty store accepts any dimension.
    pub async fn ensure_dimension(&self, dimension: usize) -> Result<()> {
        match self.dimension().await {
            Some(stored) if stored != dimension => Err(PageLensError::ConfigError(format!(
                "embedding dimension {dimension} does not match the stored index dimension {stored}"
            ))),
            _ => Ok(()),
        }
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.read().await.contains(id)
    }

    pub async fn ids_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.inner.read().await.ids_with_prefix(prefix)
    }

    /// Copy out every record accepted by `predicate`, in insertion order
    pub async fn records_matching<F>(&self, predicate: F) -> Vec<StoredRecord>
    where
        F: Fn(&RecordRef<'_>) -> bool,
    {
        let store = self.inner.read().await;
        store
            .records()
            .filter(|record| predicate(record))
            .map(StoredRecord::from)
            .collect()
    }

    /// Handle to the collection called `name`
    ///
    /// Every name maps onto this store.
    pub fn get_or_create_collection(&self, name: impl Into<String>) -> NamedCollection {
        NamedCollection::new(name, self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths_in(dir: &std::path::Path) -> StorePaths {
        StorePaths {
            index_path: dir.join("index.idx"),
            metadata_path: dir.join("metadata.json"),
        }
    }

    #[tokio::test]
    async fn test_open_missing_files_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let shared = SharedDocumentStore::open(paths_in(dir.path())).unwrap();
        assert_eq!(shared.count().await, 0);
        assert_eq!(shared.dimension().await, None);
    }

    #[tokio::test]
    async fn test_delete_matching_persists() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        let shared = SharedDocumentStore::open(paths.clone()).unwrap();

        shared
            .add_and_persist(
                vec!["p1".into(), "p2".into(), "other".into()],
                vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
                vec!["a.pdf_1".into(), "a.pdf_2".into(), "b.pdf_1".into()],
                None,
            )
            .await
            .unwrap();

        assert_eq!(
            shared
                .delete_matching(|r| r.id.starts_with("a.pdf_"))
                .await
                .unwrap(),
            2
        );
        assert_eq!(
            shared
                .delete_matching(|r| r.id.starts_with("missing_"))
                .await
                .unwrap(),
            0
        );

        let reopened = SharedDocumentStore::open(paths).unwrap();
        assert_eq!(reopened.ids_with_prefix("").await, vec!["b.pdf_1"]);
    }

    #[tokio::test]
    async fn test_failed_save_leaves_store_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the data directory should be makes every save fail.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let shared = SharedDocumentStore::open(paths_in(&blocker)).unwrap();

        let err = shared
            .add_and_persist(
                vec!["p1".into(), "p2".into()],
                vec![vec![1.0, 0.0], vec![0.0, 1.0]],
                vec!["a.pdf_1".into(), "a.pdf_2".into()],
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PageLensError::StorageError(_)));
        assert_eq!(shared.count().await, 0);
        assert!(!shared.contains("a.pdf_1").await);

        shared
            .add(vec!["kept".into()], vec![vec![1.0, 1.0]], vec!["b.pdf_1".into()], None)
            .await
            .unwrap();
        assert!(shared
            .delete_and_persist(&["b.pdf_1".to_string()])
            .await
            .is_err());
        assert!(shared
            .delete_matching(|r| r.id == "b.pdf_1")
            .await
            .is_err());
        assert_eq!(shared.ids_with_prefix("").await, vec!["b.pdf_1"]);
    }

    #[tokio::test]
    async fn test_ensure_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let shared = SharedDocumentStore::open(paths_in(dir.path())).unwrap();
        assert!(shared.ensure_dimension(384).await.is_ok());

        shared
            .add(vec!["a".into()], vec![vec![0.5; 3]], vec!["a.pdf_1".into()], None)
            .await
            .unwrap();
        assert!(shared.ensure_dimension(3).await.is_ok());
        assert!(matches!(
            shared.ensure_dimension(384).await,
            Err(PageLensError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_records_matching() {
        let dir = tempfile::tempdir().unwrap();
        let shared = SharedDocumentStore::open(paths_in(dir.path())).unwrap();

        let mut image = Metadata::new();
        image.insert("kind".into(), "image".into());
        shared
            .add(
                vec!["page".into(), "https://img".into()],
                vec![vec![1.0], vec![2.0]],
                vec!["doc_1".into(), "doc_img_x".into()],
                Some(vec![Metadata::new(), image]),
            )
            .await
            .unwrap();

        let images = shared
            .records_matching(|r| r.metadata.get("kind").and_then(|v| v.as_str()) == Some("image"))
            .await;
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].id, "doc_img_x");
        assert_eq!(images[0].document, "https://img");
    }
}
