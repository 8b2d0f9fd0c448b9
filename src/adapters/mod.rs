//! Adapter interfaces for the pipeline's external collaborators.
//!
//! - `ContentSampler`: pulls a bounded text sample out of a file
//! - `NameGenerator`: turns a sample into a descriptive name
//!
//! Name generators never fail from the caller's point of view: any error
//! inside `try_generate` is replaced by a timestamp-based name.

pub mod remote;
pub mod sampler;
pub mod simulated;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{LlmMode, ResolvedConfig};
use crate::domain::{CandidateName, ContentSample};

pub use remote::{RemoteNamer, RemoteNamerConfig};
pub use sampler::{ExtractionError, FileSampler};
pub use simulated::SimulatedNamer;

/// Extracts a bounded text sample from a file
#[async_trait]
pub trait ContentSampler: Send + Sync {
    /// Return at most `max_length` code points of text from `path`
    async fn sample(&self, path: &Path, max_length: usize) -> Result<ContentSample, ExtractionError>;
}

/// Errors a name generator may hit internally
#[derive(Debug, Error)]
pub enum NameGenError {
    #[error("No usable words in sample")]
    NoKeywords,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Response(String),

    #[error("Model returned an empty name")]
    EmptyName,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

/// Proposes a descriptive name (no extension) for a content sample
#[async_trait]
pub trait NameGenerator: Send + Sync {
    /// Human-readable generator name
    fn name(&self) -> &str;

    /// Generate a name, or report why not
    async fn try_generate(&self, sample: &ContentSample) -> Result<CandidateName, NameGenError>;

    /// Generate a name, substituting the timestamp fallback on any failure
    async fn generate(&self, sample: &ContentSample) -> CandidateName {
        if sample.is_blank() {
            warn!(source = %sample.source_path.display(), "Empty content sample, using fallback name");
            return timestamp_name();
        }

        match self.try_generate(sample).await {
            Ok(name) if !name.raw.trim().is_empty() => {
                debug!(generator = self.name(), name = %name, "Generated name");
                name
            }
            Ok(_) => {
                warn!(generator = self.name(), "Generator returned a blank name, using fallback");
                timestamp_name()
            }
            Err(e) => {
                warn!(
                    generator = self.name(),
                    source = %sample.source_path.display(),
                    error = %e,
                    "Name generation failed, using fallback"
                );
                timestamp_name()
            }
        }
    }
}

/// Deterministic fallback name: `document_YYYYMMDD_HHMMSS` in local time
pub fn timestamp_name() -> CandidateName {
    CandidateName::new(format!("document_{}", Local::now().format("%Y%m%d_%H%M%S")))
}

/// Build the name generator selected by configuration
pub fn build_namer(config: &ResolvedConfig) -> Arc<dyn NameGenerator> {
    match config.llm.mode {
        LlmMode::Simulated => Arc::new(SimulatedNamer::new()),
        LlmMode::Remote => Arc::new(RemoteNamer::new(RemoteNamerConfig::from(&config.llm.remote))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct FailingNamer;

    #[async_trait]
    impl NameGenerator for FailingNamer {
        fn name(&self) -> &str {
            "failing"
        }

        async fn try_generate(&self, _sample: &ContentSample) -> Result<CandidateName, NameGenError> {
            Err(NameGenError::Http("connection refused".to_string()))
        }
    }

    fn sample(text: &str) -> ContentSample {
        ContentSample::truncated(text, 1000, PathBuf::from("/in/a.txt"))
    }

    fn is_timestamp_name(name: &CandidateName) -> bool {
        let rest = match name.raw.strip_prefix("document_") {
            Some(rest) => rest,
            None => return false,
        };
        rest.len() == 15
            && rest.chars().enumerate().all(|(i, c)| if i == 8 { c == '_' } else { c.is_ascii_digit() })
    }

    #[test]
    fn test_timestamp_name_shape() {
        assert!(is_timestamp_name(&timestamp_name()));
    }

    #[tokio::test]
    async fn test_failure_falls_back() {
        let name = FailingNamer.generate(&sample("Quarterly revenue")).await;
        assert!(is_timestamp_name(&name));
    }

    #[tokio::test]
    async fn test_blank_sample_falls_back() {
        let name = SimulatedNamer::new().generate(&sample("   \n\t")).await;
        assert!(is_timestamp_name(&name));
    }
}
