//! File-creation events handed to the pipeline by the event source.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of document the event source recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectedType {
    Pdf,
    Text,
}

impl DetectedType {
    /// Detect the type from a path's extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::from_extension(ext)
    }

    /// Map a bare extension (no leading dot) to a type
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "text" => Some(Self::Text),
            _ => None,
        }
    }

    /// Config-facing name ("pdf" / "txt")
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Text => "txt",
        }
    }
}

/// A newly created file observed in the watched directory.
///
/// Immutable once built; each event is consumed by exactly one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEvent {
    /// Unique identifier, carried into the processing result
    pub id: Uuid,

    /// Path of the new file
    pub path: PathBuf,

    /// Type the event source detected
    pub detected_type: DetectedType,

    /// When the event source observed the file
    pub observed_at: DateTime<Utc>,
}

impl FileEvent {
    /// Create an event observed now
    pub fn new(path: impl Into<PathBuf>, detected_type: DetectedType) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
            detected_type,
            observed_at: Utc::now(),
        }
    }

    /// Build an event from a path, detecting the type from its extension
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let detected_type = DetectedType::from_path(&path)?;
        Some(Self::new(path, detected_type))
    }

    /// Extension of the source file, case preserved, without the leading dot.
    ///
    /// Empty when the file has no extension.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// File name only, for log lines
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_type_case_insensitive() {
        assert_eq!(DetectedType::from_path(Path::new("a/report.PDF")), Some(DetectedType::Pdf));
        assert_eq!(DetectedType::from_path(Path::new("notes.txt")), Some(DetectedType::Text));
        assert_eq!(DetectedType::from_path(Path::new("notes.Text")), Some(DetectedType::Text));
        assert_eq!(DetectedType::from_path(Path::new("image.png")), None);
        assert_eq!(DetectedType::from_path(Path::new("README")), None);
    }

    #[test]
    fn test_extension_preserves_case() {
        let event = FileEvent::from_path("/downloads/Scan.PdF").unwrap();
        assert_eq!(event.extension(), "PdF");
        assert_eq!(event.file_name(), "Scan.PdF");
        assert_eq!(event.detected_type, DetectedType::Pdf);
    }
}
