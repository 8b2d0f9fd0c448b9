//! Main orchestrator for the per-file pipeline.
//!
//! Drives one event through `RECEIVED → SAMPLING → NAMING → PLACING` and
//! always ends in exactly one terminal [`ProcessingResult`]. Failures are
//! converted to results, never propagated.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::adapters::{self, ContentSampler, ExtractionError, FileSampler, NameGenerator};
use crate::config::ResolvedConfig;
use crate::domain::{CandidateName, ErrorKind, FileEvent, ProcessingResult, ResolvedDestination, Stage};

use super::locks::PathLocks;
use super::placement::PlacementEngine;
use super::resolver;
use super::sanitizer::sanitize;

/// Name that would be used for a file, without moving it
#[derive(Debug, Clone)]
pub struct Suggestion {
    pub candidate: CandidateName,
    pub destination: ResolvedDestination,
}

/// Main pipeline orchestrator
pub struct Orchestrator {
    sampler: Arc<dyn ContentSampler>,
    namer: Arc<dyn NameGenerator>,
    placement: PlacementEngine,
    locks: PathLocks,
    organized_dir: PathBuf,
    sample_length: usize,
}

impl Orchestrator {
    /// Create an orchestrator from its collaborators
    pub fn new(
        sampler: Arc<dyn ContentSampler>,
        namer: Arc<dyn NameGenerator>,
        placement: PlacementEngine,
        organized_dir: impl Into<PathBuf>,
        sample_length: usize,
    ) -> Self {
        Self {
            sampler,
            namer,
            placement,
            locks: PathLocks::new(),
            organized_dir: organized_dir.into(),
            sample_length,
        }
    }

    /// Wire up the file sampler, the configured name generator and a
    /// placement engine that stops retrying on `shutdown`
    pub fn from_config(config: &ResolvedConfig, shutdown: CancellationToken) -> Self {
        let placement = PlacementEngine::new(config.retry_policy()).with_shutdown(shutdown);
        Self::new(
            Arc::new(FileSampler::new()),
            adapters::build_namer(config),
            placement,
            config.monitoring.organized_dir.clone(),
            config.processing.content_sample_length,
        )
    }

    pub fn organized_dir(&self) -> &Path {
        &self.organized_dir
    }

    pub fn namer_name(&self) -> &str {
        self.namer.name()
    }

    /// Run the pipeline for one event.
    ///
    /// Safe to call concurrently; runs for the same source path are
    /// serialized.
    #[instrument(skip(self, event), fields(event_id = %event.id, path = %event.path.display()))]
    pub async fn process(&self, event: FileEvent) -> ProcessingResult {
        let started = Instant::now();
        let _guard = self.locks.acquire(&event.path).await;
        debug!(stage = %Stage::Received, "Acquired path lock");

        let result = self.run_stages(&event).await;
        let result = result.with_duration(started.elapsed().as_millis() as u64);

        match &result.error {
            None => info!(
                stage = %Stage::Succeeded,
                new_path = ?result.new_path,
                duration_ms = result.duration_ms,
                "Pipeline finished"
            ),
            Some(error) => warn!(
                stage = %Stage::Failed,
                failed_stage = ?result.failed_stage,
                kind = %error.kind,
                message = %error.message,
                "Pipeline failed, file left in place"
            ),
        }

        result
    }

    async fn run_stages(&self, event: &FileEvent) -> ProcessingResult {
        let source = &event.path;

        // duplicate deliveries find the source already moved
        if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            return ProcessingResult::failed(
                event.id,
                source.clone(),
                Stage::Received,
                ErrorKind::SourceMissing,
                format!("Source file no longer exists: {}", source.display()),
            );
        }

        debug!(stage = %Stage::Sampling, "Sampling content");
        let sample = match self.sampler.sample(source, self.sample_length).await {
            Ok(sample) => sample,
            Err(e) => {
                let kind = match &e {
                    ExtractionError::NotFound(_) => ErrorKind::SourceMissing,
                    _ => ErrorKind::ExtractionFailed,
                };
                return ProcessingResult::failed(event.id, source.clone(), Stage::Sampling, kind, e.to_string());
            }
        };

        debug!(stage = %Stage::Naming, chars = sample.char_len(), "Generating name");
        let candidate = self.namer.generate(&sample).await;

        debug!(stage = %Stage::Placing, candidate = %candidate, "Placing file");
        let extension = event.extension();
        let placed = self
            .placement
            .place(source, &self.organized_dir, &candidate, &extension)
            .await;

        let result = match placed {
            Ok(dest) => ProcessingResult::succeeded(event.id, source.clone(), dest.path()),
            Err(e) => ProcessingResult::failed(event.id, source.clone(), Stage::Placing, e.kind, e.message),
        };
        result.with_generated_name(candidate.raw)
    }

    /// Sample and name `path`, and report where it would land right now
    pub async fn suggest(&self, path: &Path) -> Result<Suggestion> {
        let sample = self
            .sampler
            .sample(path, self.sample_length)
            .await
            .with_context(|| format!("Failed to sample {}", path.display()))?;

        let candidate = self.namer.generate(&sample).await;

        let extension = FileEvent::from_path(path)
            .map(|e| e.extension())
            .unwrap_or_default();
        let destination = resolver::resolve(&self.organized_dir, &sanitize(&candidate.raw), &extension)?;

        Ok(Suggestion { candidate, destination })
    }
}
