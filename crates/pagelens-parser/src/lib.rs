//! PageLens Parser - Page-level document parsing
//!
//! Supports parsing of:
//! - PDF documents (one text block per page)
//! - Markdown and plain text files
//! - Image mapping files describing images extracted from PDFs
//!
//! Each parser implements the `DocumentParser` trait and produces
//! a `ParsedDocument` whose pages become individual store records.

pub mod image_mapping;
pub mod pdf;

pub use image_mapping::{load_image_mapping, ImageMappingEntry};
pub use pdf::PdfParser;

use std::path::Path;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during document parsing
#[derive(Error, Debug)]
pub enum ParserError {
    /// File format is not supported
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// IO error while reading the file
    #[error("IO error reading file: {path}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// PDF parsing error
    #[error("PDF parsing error: {0}")]
    PdfError(String),

    /// Image mapping file could not be decoded
    #[error("Invalid image mapping {path}: {message}")]
    ImageMappingError { path: String, message: String },
}

pub type Result<T> = std::result::Result<T, ParserError>;

// ============================================================================
// Parsed Document Types
// ============================================================================

/// Text of a single page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number
    pub number: u32,

    /// Extracted text
    pub text: String,
}

impl PageText {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A parsed document split into pages
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// File name without directories, used as the record id prefix
    pub file_name: String,

    /// Detected file type
    pub file_type: FileType,

    /// Pages in document order
    pub pages: Vec<PageText>,

    /// Document title, when one could be detected
    pub title: Option<String>,
}

impl ParsedDocument {
    /// Create a new parsed document
    pub fn new(file_name: impl Into<String>, file_type: FileType) -> Self {
        Self {
            file_name: file_name.into(),
            file_type,
            pages: Vec::new(),
            title: None,
        }
    }

    /// Set pages
    pub fn with_pages(mut self, pages: Vec<PageText>) -> Self {
        self.pages = pages;
        self
    }

    /// Pages that carry any text
    pub fn non_blank_pages(&self) -> impl Iterator<Item = &PageText> {
        self.pages.iter().filter(|page| !page.is_blank())
    }

    /// Number of pages
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Get total word count (approximate)
    pub fn word_count(&self) -> usize {
        self.pages
            .iter()
            .map(|page| page.text.split_whitespace().count())
            .sum()
    }
}

/// Split extracted text into pages on form feeds
///
/// A trailing empty segment after the final form feed is dropped.
pub fn split_pages(text: &str) -> Vec<PageText> {
    let mut segments: Vec<&str> = text.split('\x0C').collect();
    if segments.len() > 1 && segments.last().is_some_and(|s| s.trim().is_empty()) {
        segments.pop();
    }

    segments
        .into_iter()
        .enumerate()
        .map(|(i, text)| PageText {
            number: i as u32 + 1,
            text: text.trim().to_string(),
        })
        .collect()
}

/// Final path component as a string
pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Supported file types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Pdf,
    Markdown,
    PlainText,
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "md" | "markdown" => Self::Markdown,
            "txt" => Self::PlainText,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from path
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pdf => write!(f, "pdf"),
            Self::Markdown => write!(f, "markdown"),
            Self::PlainText => write!(f, "text"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// ============================================================================
// Parser Trait
// ============================================================================

/// Trait for document parsers
pub trait DocumentParser: Send + Sync {
    /// Parse a document from a file path
    fn parse(&self, path: &Path) -> Result<ParsedDocument>;

    /// Get supported file types
    fn supported_types(&self) -> &[FileType];

    /// Check if this parser can handle a file type
    fn can_parse(&self, file_type: FileType) -> bool {
        self.supported_types().contains(&file_type)
    }
}

// ============================================================================
// Parser Registry
// ============================================================================

/// Registry of available parsers
pub struct ParserRegistry {
    parsers: Vec<Box<dyn DocumentParser>>,
}

impl ParserRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    /// Registry with the PDF and plain text parsers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(PdfParser::new());
        registry.register(PlainTextParser);
        registry
    }

    /// Register a parser
    pub fn register<P: DocumentParser + 'static>(&mut self, parser: P) {
        self.parsers.push(Box::new(parser));
    }

    /// Find a parser for a file type
    pub fn find_parser(&self, file_type: FileType) -> Option<&dyn DocumentParser> {
        self.parsers
            .iter()
            .find(|p| p.can_parse(file_type))
            .map(|p| p.as_ref())
    }

    /// Parse a file using the appropriate parser
    pub fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let file_type = FileType::from_path(path);

        if file_type == FileType::Unknown {
            return Err(ParserError::UnsupportedFormat(
                path.extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("none")
                    .to_string(),
            ));
        }

        let parser = self
            .find_parser(file_type)
            .ok_or_else(|| ParserError::UnsupportedFormat(file_type.to_string()))?;

        parser.parse(path)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ============================================================================
// Plain Text
// ============================================================================

/// Plain text and markdown parser; form feeds mark page breaks
pub struct PlainTextParser;

impl DocumentParser for PlainTextParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let content = std::fs::read_to_string(path).map_err(|e| ParserError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        let mut doc = ParsedDocument::new(file_name_of(path), FileType::from_path(path))
            .with_pages(split_pages(&content));
        doc.title = content
            .lines()
            .map(|line| line.trim_start_matches('#').trim())
            .find(|line| !line.is_empty())
            .map(str::to_string);
        Ok(doc)
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::PlainText, FileType::Markdown]
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_extension("pdf"), FileType::Pdf);
        assert_eq!(FileType::from_extension("PDF"), FileType::Pdf);
        assert_eq!(FileType::from_extension("md"), FileType::Markdown);
        assert_eq!(FileType::from_extension("docx"), FileType::Unknown);
    }

    #[test]
    fn test_split_pages() {
        let pages = split_pages("first page\x0C  \x0Cthird page\x0C");
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].text, "first page");
        assert!(pages[1].is_blank());
        assert_eq!(pages[2].number, 3);
        assert_eq!(pages[2].text, "third page");
    }

    #[test]
    fn test_split_pages_without_breaks() {
        let pages = split_pages("just one page\n");
        assert_eq!(
            pages,
            vec![PageText {
                number: 1,
                text: "just one page".to_string()
            }]
        );
    }

    #[test]
    fn test_plain_text_parser() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Floor plans\nRoom A\x0CRoom B").unwrap();

        let doc = ParserRegistry::with_defaults().parse(&path).unwrap();
        assert_eq!(doc.file_name, "notes.md");
        assert_eq!(doc.file_type, FileType::Markdown);
        assert_eq!(doc.title.as_deref(), Some("Floor plans"));
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.non_blank_pages().count(), 2);
        assert_eq!(doc.word_count(), 7);
    }

    #[test]
    fn test_registry_rejects_unknown() {
        let registry = ParserRegistry::with_defaults();
        let err = registry.parse(Path::new("report.docx")).unwrap_err();
        assert!(matches!(err, ParserError::UnsupportedFormat(ext) if ext == "docx"));
    }
}
