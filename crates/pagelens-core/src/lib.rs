//! PageLens Core - Shared types, traits, and errors
//!
//! This crate defines the abstractions used throughout PageLens:
//! - Common error types
//! - Record metadata values
//! - Page identifiers for page-level records
//! - The LLM client trait
//! - Configuration management

pub mod config;

pub use config::{
    AppConfig, ConfigError, EmbeddingConfig, EmbeddingProviderKind, LlmConfig, LlmProvider,
    LoggingConfig, RetrievalConfig, ServerConfig, StoreConfig,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for PageLens operations
#[derive(Error, Debug)]
pub enum PageLensError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Duplicate record id: {0}")]
    DuplicateId(String),

    #[error("Corrupt document store: {0}")]
    CorruptStore(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PageLensError>;

// ============================================================================
// Record Metadata
// ============================================================================

/// A single metadata value attached to a stored record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl MetadataValue {
    /// Borrow the value as a string slice, if it is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as an integer, if it is one
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for MetadataValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Metadata mapping stored alongside each record
pub type Metadata = BTreeMap<String, MetadataValue>;

// ============================================================================
// Page Identifiers
// ============================================================================

/// Identifier of a page-level record: `<document>_<page>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageId {
    /// Source document name (usually the PDF file name)
    pub document: String,

    /// 1-based page number
    pub page: u32,
}

impl PageId {
    /// Create a new page id
    pub fn new(document: impl Into<String>, page: u32) -> Self {
        Self {
            document: document.into(),
            page,
        }
    }

    /// Prefix shared by every record derived from `document`
    pub fn document_prefix(document: &str) -> String {
        format!("{document}_")
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.document, self.page)
    }
}

/// Reasons a record id is not a page id
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PageIdError {
    #[error("record id {0:?} has no page separator")]
    MissingSeparator(String),

    #[error("record id {0:?} has an empty document name")]
    EmptyDocument(String),

    #[error("record id {id:?} has an invalid page number {page:?}")]
    InvalidPage { id: String, page: String },
}

impl FromStr for PageId {
    type Err = PageIdError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (document, page) = s
            .rsplit_once('_')
            .ok_or_else(|| PageIdError::MissingSeparator(s.to_string()))?;

        if document.is_empty() {
            return Err(PageIdError::EmptyDocument(s.to_string()));
        }

        let invalid = || PageIdError::InvalidPage {
            id: s.to_string(),
            page: page.to_string(),
        };
        if !page.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let page: u32 = page.parse().map_err(|_| invalid())?;
        if page == 0 {
            return Err(invalid());
        }

        Ok(Self::new(document, page))
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for LLM clients
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a response
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Model name for logging
    fn model(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_parse() {
        let id: PageId = "manual.pdf_12".parse().unwrap();
        assert_eq!(id.document, "manual.pdf");
        assert_eq!(id.page, 12);
        assert_eq!(id.to_string(), "manual.pdf_12");
    }

    #[test]
    fn test_page_id_uses_last_separator() {
        let id: PageId = "space_planning_guide.pdf_3".parse().unwrap();
        assert_eq!(id.document, "space_planning_guide.pdf");
        assert_eq!(id.page, 3);
    }

    #[test]
    fn test_page_id_rejects_malformed() {
        assert_eq!(
            "nopage".parse::<PageId>(),
            Err(PageIdError::MissingSeparator("nopage".to_string()))
        );
        assert!(matches!(
            "_4".parse::<PageId>(),
            Err(PageIdError::EmptyDocument(_))
        ));
        assert!(matches!(
            "guide.pdf_img_page_1_img_1.png".parse::<PageId>(),
            Err(PageIdError::InvalidPage { .. })
        ));
        assert!(matches!(
            "guide.pdf_0".parse::<PageId>(),
            Err(PageIdError::InvalidPage { .. })
        ));
        assert!(matches!(
            "guide.pdf_+4".parse::<PageId>(),
            Err(PageIdError::InvalidPage { .. })
        ));
    }

    #[test]
    fn test_metadata_value_json() {
        let mut metadata = Metadata::new();
        metadata.insert("page_number".to_string(), 3u32.into());
        metadata.insert("score".to_string(), 0.5.into());
        metadata.insert("kind".to_string(), "page".into());
        metadata.insert("reviewed".to_string(), true.into());

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "page", "page_number": 3, "reviewed": true, "score": 0.5})
        );

        let back: Metadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, metadata);
        assert_eq!(back["page_number"].as_i64(), Some(3));
        assert_eq!(back["kind"].as_str(), Some("page"));
    }
}
