//! PDF document parser using pdf-extract
//!
//! Extracts text per page. pdf-extract emits a form feed between pages,
//! which is where the text is split.

use std::path::Path;

use crate::{file_name_of, split_pages, DocumentParser, FileType, ParsedDocument, ParserError, Result};

/// PDF document parser
#[derive(Debug, Clone, Default)]
pub struct PdfParser;

impl PdfParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse PDF bytes already in memory
    pub fn parse_bytes(&self, file_name: impl Into<String>, bytes: &[u8]) -> Result<ParsedDocument> {
        let text = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ParserError::PdfError(e.to_string()))?;

        let mut doc = ParsedDocument::new(file_name, FileType::Pdf).with_pages(split_pages(&text));
        doc.title = detect_title(&doc);
        Ok(doc)
    }
}

/// First short non-empty line of the first non-blank page
fn detect_title(doc: &ParsedDocument) -> Option<String> {
    doc.non_blank_pages()
        .next()?
        .text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .filter(|line| line.len() < 200)
        .map(str::to_string)
}

impl DocumentParser for PdfParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let bytes = std::fs::read(path).map_err(|e| ParserError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        self.parse_bytes(file_name_of(path), &bytes)
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Pdf]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PageText;

    #[test]
    fn test_supported_types() {
        let parser = PdfParser::new();
        assert!(parser.can_parse(FileType::Pdf));
        assert!(!parser.can_parse(FileType::PlainText));
    }

    #[test]
    fn test_rejects_non_pdf_bytes() {
        let err = PdfParser::new()
            .parse_bytes("broken.pdf", b"definitely not a pdf")
            .unwrap_err();
        assert!(matches!(err, ParserError::PdfError(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = PdfParser::new()
            .parse(Path::new("/nonexistent/manual.pdf"))
            .unwrap_err();
        assert!(matches!(err, ParserError::IoError { .. }));
    }

    #[test]
    fn test_title_skips_blank_pages() {
        let doc = ParsedDocument::new("guide.pdf", FileType::Pdf).with_pages(vec![
            PageText {
                number: 1,
                text: String::new(),
            },
            PageText {
                number: 2,
                text: "\n  Space Planning Guide\nIntro".to_string(),
            },
        ]);
        assert_eq!(detect_title(&doc).as_deref(), Some("Space Planning Guide"));
    }
}
