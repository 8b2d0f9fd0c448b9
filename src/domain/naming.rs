//! Values that flow between the naming stages of the pipeline.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Bounded text excerpt taken from a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSample {
    /// Extracted text, never longer than the configured maximum in code points
    pub text: String,

    /// File the text was taken from
    pub source_path: PathBuf,
}

impl ContentSample {
    /// Build a sample, truncating `text` to `max_length` code points
    pub fn truncated(text: &str, max_length: usize, source_path: impl Into<PathBuf>) -> Self {
        let text = match text.char_indices().nth(max_length) {
            Some((byte_idx, _)) => text[..byte_idx].to_string(),
            None => text.to_string(),
        };
        Self {
            text,
            source_path: source_path.into(),
        }
    }

    /// Length in code points
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Untrusted name proposed by a name generator (no extension).
///
/// May be empty or contain separators and characters illegal on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateName {
    pub raw: String,
}

impl CandidateName {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }
}

impl fmt::Display for CandidateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A filesystem-safe, non-empty base name.
///
/// Only produced by [`crate::core::sanitize`], so every value holds
/// characters from `[A-Za-z0-9_.-]` and no path separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SanitizedName {
    value: String,
}

impl SanitizedName {
    pub(crate) fn from_sanitized(value: String) -> Self {
        debug_assert!(!value.is_empty());
        Self { value }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_string(self) -> String {
        self.value
    }
}

impl fmt::Display for SanitizedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// A destination that was free at the moment it was resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDestination {
    pub dir: PathBuf,
    pub filename: String,
}

impl ResolvedDestination {
    pub fn new(dir: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            filename: filename.into(),
        }
    }

    /// Full path `dir/filename`
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.filename)
    }
}
