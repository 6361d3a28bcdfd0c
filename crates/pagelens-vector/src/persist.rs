//! On-disk format of the document store
//!
//! Two artifacts are written side by side:
//!
//! - the index blob: `PLIX` magic, `u32` format version, `u32` dimension,
//!   `u64` row count, then `rows * dimension` little-endian `f32` values
//! - the metadata bundle: JSON object `{documents, ids, metadata}` with
//!   three arrays aligned by position
//!
//! Both are written to a sibling temp file and renamed into place.

use crate::index::FlatL2Index;
use pagelens_core::{Metadata, PageLensError, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

const INDEX_MAGIC: &[u8; 4] = b"PLIX";
const INDEX_FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

// ============================================================================
// Index blob
// ============================================================================

/// Serialize an index into the blob format
pub fn encode_index(index: &FlatL2Index) -> Vec<u8> {
    let values = index.as_slice();
    let mut out = Vec::with_capacity(HEADER_LEN + values.len() * 4);

    out.extend_from_slice(INDEX_MAGIC);
    out.extend_from_slice(&INDEX_FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(index.dimension() as u32).to_le_bytes());
    out.extend_from_slice(&(index.len() as u64).to_le_bytes());
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

/// Parse an index blob
pub fn decode_index(bytes: &[u8]) -> Result<FlatL2Index> {
    if bytes.len() < HEADER_LEN {
        return Err(corrupt("index blob is shorter than its header"));
    }
    if &bytes[0..4] != INDEX_MAGIC {
        return Err(corrupt("index blob has an unknown magic"));
    }

    let version = read_u32(&bytes[4..8]);
    if version != INDEX_FORMAT_VERSION {
        return Err(corrupt(format!(
            "unsupported index format version {version}"
        )));
    }

    let dimension = read_u32(&bytes[8..12]) as usize;
    let rows = u64::from_le_bytes([
        bytes[12], bytes[13], bytes[14], bytes[15], bytes[16], bytes[17], bytes[18], bytes[19],
    ]);

    let expected = usize::try_from(rows)
        .ok()
        .and_then(|rows| rows.checked_mul(dimension))
        .and_then(|values| values.checked_mul(4))
        .ok_or_else(|| corrupt("index header overflows"))?;

    let payload = &bytes[HEADER_LEN..];
    if payload.len() != expected {
        return Err(corrupt(format!(
            "index payload is {} bytes, header declares {expected}",
            payload.len()
        )));
    }

    let data = payload
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    FlatL2Index::from_raw(dimension, data)
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn corrupt(message: impl Into<String>) -> PageLensError {
    PageLensError::CorruptStore(message.into())
}

// ============================================================================
// Metadata bundle
// ============================================================================

/// JSON bundle of the per-record payloads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataBundle {
    pub documents: Vec<String>,
    pub ids: Vec<String>,
    pub metadata: Vec<Metadata>,
}

impl MetadataBundle {
    /// Read and parse a bundle file
    pub fn read(path: &Path) -> Result<Self> {
        let raw = fs::read(path).map_err(|e| {
            PageLensError::StorageError(format!("failed to read {}: {e}", path.display()))
        })?;
        let bundle: Self = serde_json::from_slice(&raw).map_err(|e| {
            corrupt(format!("metadata bundle {} is malformed: {e}", path.display()))
        })?;

        if bundle.documents.len() != bundle.ids.len() || bundle.metadata.len() != bundle.ids.len()
        {
            return Err(corrupt(format!(
                "metadata bundle arrays disagree: {} documents, {} ids, {} metadata",
                bundle.documents.len(),
                bundle.ids.len(),
                bundle.metadata.len()
            )));
        }
        Ok(bundle)
    }

    /// Serialize and atomically write the bundle
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| PageLensError::StorageError(format!("failed to encode bundle: {e}")))?;
        write_atomic(path, &json)
    }
}

// ============================================================================
// File helpers
// ============================================================================

/// Write `bytes` to a temp file next to `path`, then rename over it
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            PageLensError::StorageError(format!("failed to create {}: {e}", parent.display()))
        })?;
    }

    let tmp = temp_path(path);
    fs::write(&tmp, bytes).map_err(|e| {
        PageLensError::StorageError(format!("failed to write {}: {e}", tmp.display()))
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        PageLensError::StorageError(format!("failed to replace {}: {e}", path.display()))
    })
}

/// Remove a file if it exists
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PageLensError::StorageError(format!(
            "failed to remove {}: {e}",
            path.display()
        ))),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> FlatL2Index {
        let mut index = FlatL2Index::new(2);
        index.add(&[1.0, 0.0]).unwrap();
        index.add(&[0.25, -3.5]).unwrap();
        index
    }

    #[test]
    fn test_index_blob_layout() {
        let blob = encode_index(&sample_index());
        assert_eq!(&blob[0..4], b"PLIX");
        assert_eq!(blob.len(), HEADER_LEN + 2 * 2 * 4);
        assert_eq!(decode_index(&blob).unwrap(), sample_index());
    }

    #[test]
    fn test_decode_rejects_truncated_payload() {
        let mut blob = encode_index(&sample_index());
        blob.pop();
        assert!(matches!(
            decode_index(&blob),
            Err(PageLensError::CorruptStore(_))
        ));
    }

    #[test]
    fn test_decode_rejects_bad_header() {
        assert!(decode_index(b"PLI").is_err());

        let mut blob = encode_index(&sample_index());
        blob[0] = b'X';
        assert!(decode_index(&blob).is_err());

        let mut blob = encode_index(&sample_index());
        blob[4] = 9;
        assert!(decode_index(&blob).is_err());
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("bundle.json");

        write_atomic(&path, b"{}").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"{}");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_bundle_rejects_misaligned_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        fs::write(
            &path,
            r#"{"documents": ["a", "b"], "ids": ["1"], "metadata": [{}]}"#,
        )
        .unwrap();

        assert!(matches!(
            MetadataBundle::read(&path),
            Err(PageLensError::CorruptStore(_))
        ));
    }
}
