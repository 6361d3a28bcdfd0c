//! Image mapping records
//!
//! Images extracted from PDFs are uploaded elsewhere and listed in a JSON
//! array of `{image_name, s3_url, pdf_source, page_number}` objects. Extracted
//! image files are named `<pdf>_page<N>_img<M>.<ext>`.

use crate::{ParserError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

/// One uploaded image and where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMappingEntry {
    #[serde(default)]
    pub image_name: String,

    /// Public URL of the uploaded image
    #[serde(default)]
    pub s3_url: Option<String>,

    /// Name of the PDF the image was extracted from
    #[serde(default)]
    pub pdf_source: String,

    #[serde(default)]
    pub page_number: u32,
}

fn file_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<pdf>.+?)_page(?P<page>\d+)_img\d+").expect("valid image name pattern")
    })
}

impl ImageMappingEntry {
    /// Derive an entry from an extracted image file name
    ///
    /// `space_guide_page3_img1.png` yields `pdf_source = "space_guide.pdf"` and
    /// `page_number = 3`. Returns `None` for names outside that scheme.
    pub fn from_file_name(image_name: &str, url: impl Into<String>) -> Option<Self> {
        let caps = file_name_pattern().captures(image_name)?;
        let page_number = caps["page"].parse().ok()?;

        Some(Self {
            image_name: image_name.to_string(),
            s3_url: Some(url.into()),
            pdf_source: format!("{}.pdf", &caps["pdf"]),
            page_number,
        })
    }

    /// Searchable text built from the PDF name and image name
    pub fn description(&self) -> String {
        let mut description = String::new();

        if !self.pdf_source.is_empty() {
            description.push_str(&self.pdf_source.replace(".pdf.pdf", "").replace(".pdf", ""));
            description.push(' ');
        }

        description.push_str(
            &self
                .image_name
                .replace(".png", "")
                .replace("_page", " page ")
                .replace("_img", " image "),
        );
        description
    }

    /// Store record id for this image
    pub fn record_id(&self) -> String {
        format!("{}_img_{}", self.pdf_source, self.image_name)
    }

    /// URL, when present and non-empty
    pub fn url(&self) -> Option<&str> {
        self.s3_url.as_deref().filter(|url| !url.trim().is_empty())
    }
}

/// Read an image mapping JSON file
pub fn load_image_mapping(path: &Path) -> Result<Vec<ImageMappingEntry>> {
    let raw = std::fs::read_to_string(path).map_err(|e| ParserError::IoError {
        path: path.display().to_string(),
        source: e,
    })?;

    serde_json::from_str(&raw).map_err(|e| ParserError::ImageMappingError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
