//! Content sampling for PDF and plain-text files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::domain::{ContentSample, DetectedType};

use super::ContentSampler;

/// Bytes read per requested code point; a UTF-8 code point is at most four bytes
const BYTES_PER_CHAR: usize = 4;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Not a regular file: {0}")]
    NotAFile(PathBuf),

    #[error("Unsupported file type: {0:?}")]
    Unsupported(String),

    #[error("Corrupted or unreadable PDF: {0}")]
    Pdf(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Samples files by their extension: PDFs through `lopdf`, text files
/// as UTF-8 with a Latin-1 fallback
#[derive(Debug, Clone, Default)]
pub struct FileSampler;

impl FileSampler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContentSampler for FileSampler {
    async fn sample(&self, path: &Path, max_length: usize) -> Result<ContentSample, ExtractionError> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ExtractionError::NotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            return Err(ExtractionError::NotAFile(path.to_path_buf()));
        }

        let text = match DetectedType::from_path(path) {
            Some(DetectedType::Pdf) => {
                let owned = path.to_path_buf();
                tokio::task::spawn_blocking(move || extract_pdf(&owned))
                    .await
                    .map_err(|e| ExtractionError::Pdf(format!("extraction task failed: {}", e)))??
            }
            Some(DetectedType::Text) => read_text(path, max_length.saturating_mul(BYTES_PER_CHAR)).await?,
            None => {
                let ext = path
                    .extension()
                    .map(|e| e.to_string_lossy().to_string())
                    .unwrap_or_default();
                return Err(ExtractionError::Unsupported(ext));
            }
        };

        let sample = ContentSample::truncated(&text, max_length, path.to_path_buf());
        debug!(
            path = %path.display(),
            chars = sample.char_len(),
            "Extracted content sample"
        );
        Ok(sample)
    }
}

/// Page texts in page order, joined by a space
fn extract_pdf(path: &Path) -> Result<String, ExtractionError> {
    let bytes = std::fs::read(path)?;
    let doc = lopdf::Document::load_mem(&bytes).map_err(|e| ExtractionError::Pdf(e.to_string()))?;

    let mut pages: Vec<u32> = doc.get_pages().keys().cloned().collect();
    pages.sort();

    let parts: Vec<String> = pages
        .iter()
        .map(|n| doc.extract_text(&[*n]).unwrap_or_default())
        .filter(|t| !t.trim().is_empty())
        .collect();

    let text = parts.join(" ");
    if text.trim().is_empty() {
        warn!(path = %path.display(), "No text extracted from PDF");
        return Ok(String::new());
    }
    Ok(text)
}

async fn read_text(path: &Path, max_bytes: usize) -> Result<String, ExtractionError> {
    let file = tokio::fs::File::open(path).await?;
    let mut buf = Vec::new();
    file.take(max_bytes as u64).read_to_end(&mut buf).await?;
    Ok(decode_text(&buf))
}

/// UTF-8 (BOM stripped), tolerating a code point cut off by the read limit;
/// anything else is read as Latin-1, which cannot fail
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        // incomplete sequence at the very end: keep the valid prefix
        Err(e) if e.error_len().is_none() => String::from_utf8_lossy(&bytes[..e.valid_up_to()]).into_owned(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}
