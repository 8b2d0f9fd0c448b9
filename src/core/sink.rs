//! Result sinks.
//!
//! Every [`ProcessingResult`] is handed to a sink exactly once. Sinks never
//! fail the pipeline: write problems are logged and swallowed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::domain::ProcessingResult;

/// Destination for terminal results
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn record(&self, result: &ProcessingResult);
}

/// Logs each result as one structured tracing record
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

#[async_trait]
impl ResultSink for TracingSink {
    async fn record(&self, result: &ProcessingResult) {
        match (&result.new_path, &result.error) {
            (Some(new_path), _) => tracing::info!(
                event_id = %result.event_id,
                original = %result.original_path.display(),
                new_path = %new_path.display(),
                duration_ms = result.duration_ms,
                "File organized"
            ),
            (None, Some(error)) => tracing::warn!(
                event_id = %result.event_id,
                original = %result.original_path.display(),
                kind = %error.kind,
                stage = ?result.failed_stage,
                message = %error.message,
                "File left in place"
            ),
            (None, None) => tracing::warn!(
                event_id = %result.event_id,
                original = %result.original_path.display(),
                "Result without destination or error"
            ),
        }
    }
}

/// Append-only JSONL log of results
pub struct JsonlSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlSink {
    /// Open (creating parent directories) a results log at `path`
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create results log directory: {}", parent.display()))?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, result: &ProcessingResult) -> Result<()> {
        let json = serde_json::to_string(result).context("Failed to serialize result")?;

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open results log: {}", self.path.display()))?;

        file.write_all(format!("{}\n", json).as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    /// Read every result back, skipping blank lines
    pub async fn replay(&self) -> Result<Vec<ProcessingResult>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read results log: {}", self.path.display()))?;

        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).context("Failed to parse results log line"))
            .collect()
    }
}

#[async_trait]
impl ResultSink for JsonlSink {
    async fn record(&self, result: &ProcessingResult) {
        if let Err(e) = self.append(result).await {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to append result");
        }
    }
}

/// Sends each result to several sinks in order
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ResultSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl ResultSink for FanoutSink {
    async fn record(&self, result: &ProcessingResult) {
        for sink in &self.sinks {
            sink.record(result).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorKind, Stage};
    use tempfile::TempDir;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_jsonl_sink_appends_and_replays() {
        let temp = TempDir::new().unwrap();
        let sink = JsonlSink::open(temp.path().join("logs/results.jsonl")).await.unwrap();

        let ok = ProcessingResult::succeeded(
            Uuid::new_v4(),
            PathBuf::from("/in/a.pdf"),
            PathBuf::from("/out/Revenue.pdf"),
        );
        let failed = ProcessingResult::failed(
            Uuid::new_v4(),
            PathBuf::from("/in/b.pdf"),
            Stage::Sampling,
            ErrorKind::ExtractionFailed,
            "bad pdf",
        );

        sink.record(&ok).await;
        sink.record(&failed).await;

        let replayed = sink.replay().await.unwrap();
        assert_eq!(replayed.len(), 2);
        assert!(replayed[0].success);
        assert_eq!(replayed[1].error_kind(), Some(ErrorKind::ExtractionFailed));
    }

    #[tokio::test]
    async fn test_replay_missing_log_is_empty() {
        let temp = TempDir::new().unwrap();
        let sink = JsonlSink::open(temp.path().join("none.jsonl")).await.unwrap();
        assert!(sink.replay().await.unwrap().is_empty());
    }
}
