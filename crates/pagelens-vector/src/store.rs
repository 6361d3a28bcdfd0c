//! Vector document store
//!
//! Keeps an exact L2 index together with three position-aligned arrays:
//! record ids, document texts, and metadata. Row `i` of the index is the
//! embedding of `ids[i]`.

use crate::index::FlatL2Index;
use crate::persist::{self, MetadataBundle};
use pagelens_core::{Metadata, PageLensError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Results for a single query vector, nearest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryMatches {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub distances: Vec<f32>,
    pub metadatas: Vec<Metadata>,
}

impl QueryMatches {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Borrowed view of one stored record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordRef<'a> {
    pub id: &'a str,
    pub document: &'a str,
    pub metadata: &'a Metadata,
}

/// Owned copy of one stored record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub document: String,
    pub metadata: Metadata,
}

impl From<RecordRef<'_>> for StoredRecord {
    fn from(record: RecordRef<'_>) -> Self {
        Self {
            id: record.id.to_string(),
            document: record.document.to_string(),
            metadata: record.metadata.clone(),
        }
    }
}

/// In-memory document store with exact nearest-neighbour search
#[derive(Debug, Clone, Default)]
pub struct VectorDocumentStore {
    index: Option<FlatL2Index>,
    ids: Vec<String>,
    documents: Vec<String>,
    metadata: Vec<Metadata>,
    known_ids: HashSet<String>,
}

impl VectorDocumentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from disk
    ///
    /// When either artifact is missing the store starts empty.
    pub fn load(index_path: &Path, metadata_path: &Path) -> Result<Self> {
        if !index_path.exists() || !metadata_path.exists() {
            tracing::info!(
                index = %index_path.display(),
                metadata = %metadata_path.display(),
                "No persisted store found, starting empty"
            );
            return Ok(Self::new());
        }

        let blob = fs::read(index_path).map_err(|e| {
            PageLensError::StorageError(format!("failed to read {}: {e}", index_path.display()))
        })?;
        let index = persist::decode_index(&blob)?;
        let bundle = MetadataBundle::read(metadata_path)?;

        if index.len() != bundle.ids.len() {
            return Err(PageLensError::CorruptStore(format!(
                "index holds {} rows but metadata lists {} records",
                index.len(),
                bundle.ids.len()
            )));
        }

        let mut known_ids = HashSet::with_capacity(bundle.ids.len());
        for id in &bundle.ids {
            if !known_ids.insert(id.clone()) {
                return Err(PageLensError::CorruptStore(format!(
                    "record id {id:?} appears more than once"
                )));
            }
        }

        tracing::info!(
            records = bundle.ids.len(),
            dimension = index.dimension(),
            "Loaded document store"
        );

        Ok(Self {
            index: (!index.is_empty()).then_some(index),
            ids: bundle.ids,
            documents: bundle.documents,
            metadata: bundle.metadata,
            known_ids,
        })
    }

    /// Persist the index and metadata bundle
    ///
    /// An empty store writes an empty bundle and removes any stale index blob.
    pub fn save(&self, index_path: &Path, metadata_path: &Path) -> Result<()> {
        match &self.index {
            Some(index) => persist::write_atomic(index_path, &persist::encode_index(index))?,
            None => persist::remove_if_exists(index_path)?,
        }

        let bundle = MetadataBundle {
            documents: self.documents.clone(),
            ids: self.ids.clone(),
            metadata: self.metadata.clone(),
        };
        bundle.write(metadata_path)?;

        tracing::debug!(records = self.ids.len(), "Saved document store");
        Ok(())
    }

    /// Append records
    ///
    /// The batch is validated as a whole before anything is stored, so a
    /// rejected batch leaves the store untouched.
    pub fn add(
        &mut self,
        documents: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        ids: Vec<String>,
        metadatas: Option<Vec<Metadata>>,
    ) -> Result<()> {
        if documents.len() != embeddings.len() || ids.len() != embeddings.len() {
            return Err(PageLensError::ValidationError(format!(
                "batch lengths disagree: {} documents, {} embeddings, {} ids",
                documents.len(),
                embeddings.len(),
                ids.len()
            )));
        }
        let metadatas = match metadatas {
            Some(metadatas) if metadatas.len() != ids.len() => {
                return Err(PageLensError::ValidationError(format!(
                    "batch has {} metadata entries for {} records",
                    metadatas.len(),
                    ids.len()
                )));
            }
            Some(metadatas) => metadatas,
            None => vec![Metadata::new(); ids.len()],
        };

        if embeddings.is_empty() {
            return Ok(());
        }

        let dimension = match &self.index {
            Some(index) => index.dimension(),
            None => embeddings[0].len(),
        };
        if dimension == 0 {
            return Err(PageLensError::ValidationError(
                "embeddings must have at least one component".to_string(),
            ));
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
            return Err(PageLensError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }

        let mut batch_ids = HashSet::with_capacity(ids.len());
        for id in &ids {
            if self.known_ids.contains(id) || !batch_ids.insert(id.as_str()) {
                return Err(PageLensError::DuplicateId(id.clone()));
            }
        }

        self.index
            .get_or_insert_with(|| FlatL2Index::new(dimension))
            .add_rows(embeddings.iter().map(Vec::as_slice))?;

        self.known_ids.extend(ids.iter().cloned());
        self.ids.extend(ids);
        self.documents.extend(documents);
        self.metadata.extend(metadatas);

        Ok(())
    }

    /// Nearest-neighbour search, one result set per query vector
    pub fn query(&self, query_embeddings: &[Vec<f32>], n_results: usize) -> Result<Vec<QueryMatches>> {
        let Some(index) = &self.index else {
            return Ok(vec![QueryMatches::default(); query_embeddings.len()]);
        };

        query_embeddings
            .iter()
            .map(|query| {
                let hits = index.search(query, n_results)?;
                let mut matches = QueryMatches::default();
                for (row, distance) in hits {
                    let (Some(id), Some(document), Some(metadata)) = (
                        self.ids.get(row),
                        self.documents.get(row),
                        self.metadata.get(row),
                    ) else {
                        continue;
                    };
                    matches.ids.push(id.clone());
                    matches.documents.push(document.clone());
                    matches.distances.push(distance);
                    matches.metadatas.push(metadata.clone());
                }
                Ok(matches)
            })
            .collect()
    }

    /// Remove every record whose id is in `ids`
    ///
    /// Unknown ids are ignored. Survivors keep their relative order and
    /// embeddings. Returns the number of records removed.
    pub fn delete<I, S>(&mut self, ids: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let targets: HashSet<String> = ids
            .into_iter()
            .map(|id| id.as_ref().to_string())
            .filter(|id| self.known_ids.contains(id))
            .collect();
        if targets.is_empty() {
            return Ok(0);
        }

        let Some(index) = &self.index else {
            return Ok(0);
        };

        let survivors: Vec<usize> = (0..self.ids.len())
            .filter(|&row| !targets.contains(&self.ids[row]))
            .collect();

        let rebuilt = if survivors.is_empty() {
            None
        } else {
            let vectors = survivors
                .iter()
                .map(|&row| {
                    index.reconstruct(row).ok_or_else(|| {
                        PageLensError::CorruptStore(format!("index has no row {row}"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            let mut rebuilt = FlatL2Index::new(index.dimension());
            rebuilt.add_rows(vectors)?;
            Some(rebuilt)
        };

        let removed = self.ids.len() - survivors.len();
        let ids: Vec<String> = survivors.iter().map(|&row| self.ids[row].clone()).collect();
        let documents = survivors
            .iter()
            .map(|&row| self.documents[row].clone())
            .collect();
        let metadata = survivors
            .iter()
            .map(|&row| self.metadata[row].clone())
            .collect();

        *self = Self {
            index: rebuilt,
            known_ids: ids.iter().cloned().collect(),
            ids,
            documents,
            metadata,
        };

        Ok(removed)
    }

    /// Number of stored records
    pub fn count(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Embedding dimension, once the first batch has been added
    pub fn dimension(&self) -> Option<usize> {
        self.index.as_ref().map(FlatL2Index::dimension)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.known_ids.contains(id)
    }

    /// Look up a record by id
    pub fn get(&self, id: &str) -> Option<RecordRef<'_>> {
        let row = self.ids.iter().position(|stored| stored == id)?;
        Some(self.record(row))
    }

    /// Stored embedding of a record
    pub fn embedding(&self, id: &str) -> Option<&[f32]> {
        let row = self.ids.iter().position(|stored| stored == id)?;
        self.index.as_ref()?.reconstruct(row)
    }

    /// Iterate records in insertion order
    pub fn records(&self) -> impl Iterator<Item = RecordRef<'_>> {
        (0..self.ids.len()).map(|row| self.record(row))
    }

    /// Ids that start with `prefix`, in insertion order
    pub fn ids_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.ids
            .iter()
            .filter(|id| id.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn record(&self, row: usize) -> RecordRef<'_> {
        RecordRef {
            id: &self.ids[row],
            document: &self.documents[row],
            metadata: &self.metadata[row],
        }
    }
}
