//! Query-time retrieval over a document collection

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use pagelens_core::{Metadata, MetadataValue, Result};
use pagelens_vector::{DocumentCollection, EmbeddingProvider};
use regex::Regex;
use serde::Serialize;

/// Ordinal given to results without a usable ordinal
pub const MISSING_ORDINAL: u64 = u64::MAX;

/// One retrieved record, nearest first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedRecord {
    pub id: String,
    pub document: String,
    pub distance: f32,
    pub metadata: Metadata,
}

/// Embeds a query and searches the collection with it
#[derive(Clone)]
pub struct RetrievalService {
    collection: Arc<dyn DocumentCollection>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl RetrievalService {
    pub fn new(collection: Arc<dyn DocumentCollection>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            collection,
            embedder,
        }
    }

    /// The `top_k` nearest records to `query`
    ///
    /// An empty collection yields no records without calling the embedder.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedRecord>> {
        if top_k == 0 || self.collection.count().await == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.encode(query).await?;
        let matches = self
            .collection
            .query(&[embedding], top_k)
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        tracing::debug!(
            collection = self.collection.name(),
            top_k,
            found = matches.len(),
            "Retrieved records"
        );

        Ok(matches
            .ids
            .into_iter()
            .zip(matches.documents)
            .zip(matches.distances)
            .zip(matches.metadatas)
            .map(|(((id, document), distance), metadata)| RetrievedRecord {
                id,
                document,
                distance,
                metadata,
            })
            .collect())
    }

    /// The `top_k` nearest records accepted by `keep`
    ///
    /// Ranks the whole collection so the filter never starves the result.
    pub async fn retrieve_where<F>(
        &self,
        query: &str,
        top_k: usize,
        keep: F,
    ) -> Result<Vec<RetrievedRecord>>
    where
        F: Fn(&RetrievedRecord) -> bool,
    {
        let everything = self.collection.count().await;
        Ok(self
            .retrieve(query, everything)
            .await?
            .into_iter()
            .filter(|record| keep(record))
            .take(top_k)
            .collect())
    }

    /// Documents most similar to `query`, duplicates removed
    ///
    /// Keeps the first occurrence of each document, in similarity order.
    pub async fn find_relevant_documents(&self, query: &str, top_k: usize) -> Result<Vec<String>> {
        let records = self.retrieve(query, top_k).await?;
        Ok(dedup_documents(records.into_iter().map(|r| r.document)))
    }

    /// Like [`Self::find_relevant_documents`], re-ordered by an ordinal
    ///
    /// The ordinal is read from metadata `key`: an integer value, or the first
    /// run of digits in a string value. Records without one sort last. Equal
    /// ordinals keep their similarity order.
    pub async fn find_relevant_documents_by_ordinal(
        &self,
        query: &str,
        top_k: usize,
        key: &str,
    ) -> Result<Vec<String>> {
        let mut records = self.retrieve(query, top_k).await?;
        records.sort_by_key(|record| {
            record
                .metadata
                .get(key)
                .and_then(parse_ordinal)
                .unwrap_or(MISSING_ORDINAL)
        });
        Ok(dedup_documents(records.into_iter().map(|r| r.document)))
    }
}

fn dedup_documents(documents: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    documents.filter(|doc| seen.insert(doc.clone())).collect()
}

fn digit_run() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"\d+").expect("valid digit pattern"))
}

/// Ordinal carried by a metadata value
pub fn parse_ordinal(value: &MetadataValue) -> Option<u64> {
    match value {
        MetadataValue::Integer(n) => u64::try_from(*n).ok(),
        MetadataValue::String(s) => digit_run().find(s)?.as_str().parse().ok(),
        _ => None,
    }
}
