//! PageLens Ingest - Loads documents into the document store
//!
//! Converts parsed pages and image mapping entries into
//! `(document, embedding, id, metadata)` records, embeds them in one
//! batch per source, and appends them to the shared store.
//!
//! Author: hephaex@gmail.com

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pagelens_core::{Metadata, MetadataValue, PageId, PageLensError, Result};
use pagelens_parser::{
    load_image_mapping, FileType, ImageMappingEntry, ParsedDocument, ParserError, ParserRegistry,
};
use pagelens_vector::{EmbeddingProvider, RecordRef, SharedDocumentStore};
use serde::Serialize;

// ============================================================================
// Report
// ============================================================================

/// Outcome of one ingestion call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Document or mapping file name
    pub document: String,

    /// Records appended to the store
    pub records_added: usize,

    /// Pages or images that produced no record
    pub skipped: usize,

    /// The document was already present and nothing was added
    pub already_ingested: bool,

    /// Detected document title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Approximate word count over every page
    pub words: usize,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Ingestion pipeline over a shared store and an embedding provider
#[derive(Clone)]
pub struct IngestionPipeline {
    store: SharedDocumentStore,
    embedder: Arc<dyn EmbeddingProvider>,
    parsers: Arc<ParserRegistry>,
}

impl IngestionPipeline {
    /// Create a pipeline with the default parsers
    pub fn new(store: SharedDocumentStore, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            embedder,
            parsers: Arc::new(ParserRegistry::with_defaults()),
        }
    }

    /// Replace the parser registry
    pub fn with_parsers(mut self, parsers: ParserRegistry) -> Self {
        self.parsers = Arc::new(parsers);
        self
    }

    /// Ingest a PDF, one record per non-blank page
    pub async fn ingest_pdf(&self, path: &Path) -> Result<IngestReport> {
        if FileType::from_path(path) != FileType::Pdf {
            return Err(PageLensError::ValidationError(format!(
                "{} is not a PDF",
                path.display()
            )));
        }
        self.ingest_file(path).await
    }

    /// Ingest any file the parser registry understands
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestReport> {
        let parsers = Arc::clone(&self.parsers);
        let owned: PathBuf = path.to_path_buf();

        let doc = tokio::task::spawn_blocking(move || parsers.parse(&owned))
            .await
            .map_err(|e| PageLensError::Other(anyhow::anyhow!("parser task failed: {e}")))?
            .map_err(parser_error)?;

        self.ingest_document(doc).await
    }

    /// Store the pages of an already parsed document
    ///
    /// A document with page records already in the store is skipped.
    pub async fn ingest_document(&self, doc: ParsedDocument) -> Result<IngestReport> {
        let mut report = IngestReport {
            document: doc.file_name.clone(),
            title: doc.title.clone(),
            words: doc.word_count(),
            ..Default::default()
        };

        if self.has_pages(&doc.file_name).await {
            tracing::info!(document = %doc.file_name, "Document already ingested, skipping");
            report.already_ingested = true;
            return Ok(report);
        }

        let ingested_at = chrono::Utc::now().to_rfc3339();
        let mut documents = Vec::new();
        let mut ids = Vec::new();
        let mut metadatas = Vec::new();

        for page in doc.non_blank_pages() {
            let mut metadata = Metadata::new();
            metadata.insert("source".to_string(), doc.file_name.clone().into());
            metadata.insert("page_number".to_string(), page.number.into());
            metadata.insert("kind".to_string(), "page".into());
            metadata.insert("ingested_at".to_string(), ingested_at.clone().into());
            if let Some(title) = &doc.title {
                metadata.insert("title".to_string(), title.clone().into());
            }

            ids.push(PageId::new(doc.file_name.clone(), page.number).to_string());
            documents.push(page.text.clone());
            metadatas.push(metadata);
        }
        report.skipped = doc.page_count() - documents.len();

        if documents.is_empty() {
            tracing::warn!(document = %doc.file_name, "No text found in document");
            return Ok(report);
        }

        let embeddings = self.embed(&documents).await?;
        report.records_added = self
            .store_records(documents, embeddings, ids, metadatas)
            .await?;

        tracing::info!(
            document = %report.document,
            pages = report.records_added,
            skipped = report.skipped,
            "Ingested document"
        );
        Ok(report)
    }

    /// Ingest an image mapping JSON file
    pub async fn ingest_image_mapping(&self, path: &Path) -> Result<IngestReport> {
        let entries = load_image_mapping(path).map_err(parser_error)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        self.ingest_images(&name, entries).await
    }

    /// Store image records; the image URL is the document
    ///
    /// Entries without a URL, or whose id is already stored, are skipped.
    pub async fn ingest_images(
        &self,
        source: &str,
        entries: Vec<ImageMappingEntry>,
    ) -> Result<IngestReport> {
        let mut report = IngestReport {
            document: source.to_string(),
            ..Default::default()
        };

        let mut seen = HashSet::new();
        let mut descriptions = Vec::new();
        let mut documents = Vec::new();
        let mut ids = Vec::new();
        let mut metadatas = Vec::new();

        for entry in entries {
            let Some(url) = entry.url() else {
                tracing::warn!(image = %entry.image_name, "Image mapping entry has no URL, skipping");
                report.skipped += 1;
                continue;
            };

            let id = entry.record_id();
            if self.store.contains(&id).await || !seen.insert(id.clone()) {
                tracing::debug!(id = %id, "Image already stored, skipping");
                report.skipped += 1;
                continue;
            }

            let mut metadata = Metadata::new();
            metadata.insert("image_name".to_string(), entry.image_name.clone().into());
            metadata.insert("pdf_source".to_string(), entry.pdf_source.clone().into());
            metadata.insert("page_number".to_string(), entry.page_number.into());
            metadata.insert("image_url".to_string(), url.into());
            metadata.insert("kind".to_string(), "image".into());

            descriptions.push(entry.description());
            documents.push(url.to_string());
            ids.push(id);
            metadatas.push(metadata);
        }

        if ids.is_empty() {
            tracing::info!(source, skipped = report.skipped, "No new images to ingest");
            return Ok(report);
        }

        let embeddings = self.embed(&descriptions).await?;
        report.records_added = self
            .store_records(documents, embeddings, ids, metadatas)
            .await?;

        tracing::info!(
            source,
            images = report.records_added,
            skipped = report.skipped,
            "Ingested image mapping"
        );
        Ok(report)
    }

    /// Delete every record of `name` and persist
    ///
    /// Only records owned by `name` are removed, so `a.pdf` never takes
    /// `a.pdf_v2.pdf` with it even though their ids share a prefix.
    pub async fn remove_document(&self, name: &str) -> Result<usize> {
        let prefix = PageId::document_prefix(name);
        let removed = self
            .store
            .delete_matching(|record| {
                record.id.starts_with(&prefix) && owning_document(record).as_deref() == Some(name)
            })
            .await?;
        if removed == 0 {
            tracing::warn!(document = name, "No records found for document");
        }
        Ok(removed)
    }

    /// Names of the documents with stored records, sorted
    pub async fn documents(&self) -> Vec<String> {
        let records = self.store.records_matching(|_| true).await;
        let names: BTreeSet<String> = records
            .iter()
            .filter_map(|record| {
                record
                    .metadata
                    .get("source")
                    .or_else(|| record.metadata.get("pdf_source"))
                    .and_then(MetadataValue::as_str)
                    .map(str::to_string)
            })
            .collect();
        names.into_iter().collect()
    }

    /// Append one batch and persist it
    async fn store_records(
        &self,
        documents: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        ids: Vec<String>,
        metadatas: Vec<Metadata>,
    ) -> Result<usize> {
        let added = ids.len();
        self.store
            .add_and_persist(documents, embeddings, ids, Some(metadatas))
            .await?;
        Ok(added)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let embeddings = self.embedder.encode_batch(texts).await?;
        if embeddings.len() != texts.len() {
            return Err(PageLensError::EmbeddingError(format!(
                "provider returned {} embeddings for {} texts",
                embeddings.len(),
                texts.len()
            )));
        }
        Ok(embeddings)
    }

    async fn has_pages(&self, document: &str) -> bool {
        self.store
            .ids_with_prefix(&PageId::document_prefix(document))
            .await
            .iter()
            .filter_map(|id| id.parse::<PageId>().ok())
            .any(|page| page.document == document)
    }
}

/// Document a record belongs to: its `source`/`pdf_source` metadata,
/// falling back to the page id
fn owning_document(record: &RecordRef<'_>) -> Option<String> {
    record
        .metadata
        .get("source")
        .or_else(|| record.metadata.get("pdf_source"))
        .and_then(MetadataValue::as_str)
        .map(str::to_string)
        .or_else(|| record.id.parse::<PageId>().ok().map(|page| page.document))
}

fn parser_error(err: ParserError) -> PageLensError {
    match err {
        ParserError::IoError { .. } => PageLensError::StorageError(err.to_string()),
        other => PageLensError::ValidationError(other.to_string()),
    }
}
