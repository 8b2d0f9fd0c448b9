//! Terminal outcome of one pipeline run.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Failure classes surfaced to the result sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Content could not be read from the source file
    ExtractionFailed,

    /// File stayed locked or busy through every attempt
    TransientLocked,

    /// Source disappeared before it could be moved
    SourceMissing,

    /// Destination path rejected by the filesystem
    DestinationInvalid,

    /// No space left for the destination
    DiskFull,

    Unknown,
}

impl ErrorKind {
    /// Whether the placement engine retries this kind
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientLocked)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtractionFailed => "EXTRACTION_FAILED",
            Self::TransientLocked => "TRANSIENT_LOCKED",
            Self::SourceMissing => "SOURCE_MISSING",
            Self::DestinationInvalid => "DESTINATION_INVALID",
            Self::DiskFull => "DISK_FULL",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error attached to a failed result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
}

/// Pipeline stages; `Succeeded` and `Failed` are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Sampling,
    Naming,
    Placing,
    Succeeded,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "RECEIVED",
            Self::Sampling => "SAMPLING",
            Self::Naming => "NAMING",
            Self::Placing => "PLACING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Exactly one of these is produced per [`super::FileEvent`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    /// Id of the event this result answers
    pub event_id: Uuid,

    pub success: bool,

    pub original_path: PathBuf,

    /// Final location, present only on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_path: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,

    /// Last stage entered before the run ended
    pub failed_stage: Option<Stage>,

    /// Name the generator proposed, if the run got that far
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_name: Option<String>,

    pub finished_at: DateTime<Utc>,

    pub duration_ms: u64,
}

impl ProcessingResult {
    pub fn succeeded(event_id: Uuid, original_path: PathBuf, new_path: PathBuf) -> Self {
        Self {
            event_id,
            success: true,
            original_path,
            new_path: Some(new_path),
            error: None,
            failed_stage: None,
            generated_name: None,
            finished_at: Utc::now(),
            duration_ms: 0,
        }
    }

    pub fn failed(
        event_id: Uuid,
        original_path: PathBuf,
        stage: Stage,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            event_id,
            success: false,
            original_path,
            new_path: None,
            error: Some(ErrorDetail {
                kind,
                message: message.into(),
            }),
            failed_stage: Some(stage),
            generated_name: None,
            finished_at: Utc::now(),
            duration_ms: 0,
        }
    }

    pub fn with_generated_name(mut self, name: impl Into<String>) -> Self {
        self.generated_name = Some(name.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Error kind, if the run failed
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::ExtractionFailed).unwrap();
        assert_eq!(json, "\"EXTRACTION_FAILED\"");

        let kind: ErrorKind = serde_json::from_str("\"DISK_FULL\"").unwrap();
        assert_eq!(kind, ErrorKind::DiskFull);
        assert_eq!(kind.to_string(), "DISK_FULL");
    }

    #[test]
    fn test_failed_result_shape() {
        let result = ProcessingResult::failed(
            Uuid::new_v4(),
            PathBuf::from("/in/broken.pdf"),
            Stage::Sampling,
            ErrorKind::ExtractionFailed,
            "Corrupted PDF",
        );

        assert!(!result.success);
        assert!(result.new_path.is_none());
        assert_eq!(result.error_kind(), Some(ErrorKind::ExtractionFailed));
        assert_eq!(result.failed_stage, Some(Stage::Sampling));

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("new_path").is_none());
        assert_eq!(json["error"]["kind"], "EXTRACTION_FAILED");
    }
}
