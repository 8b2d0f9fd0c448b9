//! Event dispatch.
//!
//! Runs the orchestrator over a stream of events with bounded concurrency
//! and records every result.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::domain::{ErrorKind, FileEvent, ProcessingResult, Stage};

use super::orchestrator::Orchestrator;
use super::sink::ResultSink;

/// Intake buffer between the event source and the dispatcher
pub const INTAKE_CAPACITY: usize = 256;

/// Counts of finished runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Long-running organizer service
pub struct Organizer {
    orchestrator: Arc<Orchestrator>,
    sink: Arc<dyn ResultSink>,
    max_workers: usize,
}

impl Organizer {
    pub fn new(orchestrator: Arc<Orchestrator>, sink: Arc<dyn ResultSink>, max_workers: usize) -> Self {
        Self {
            orchestrator,
            sink,
            max_workers: max_workers.max(1),
        }
    }

    /// Spawn the dispatcher. Returns the intake sender and a handle that
    /// resolves once the sender side is closed (or `cancel` fires) and all
    /// in-flight runs have finished.
    pub fn spawn(self, cancel: CancellationToken) -> (mpsc::Sender<FileEvent>, JoinHandle<RunSummary>) {
        let (tx, rx) = mpsc::channel::<FileEvent>(INTAKE_CAPACITY);
        let handle = tokio::spawn(async move { self.run(rx, cancel).await });
        (tx, handle)
    }

    /// Process events from `rx` until it closes or `cancel` fires.
    ///
    /// Every event taken from `rx` is answered with exactly one recorded
    /// result, including events still buffered when `cancel` fires.
    pub async fn run(&self, mut rx: mpsc::Receiver<FileEvent>, cancel: CancellationToken) -> RunSummary {
        let mut in_flight: JoinSet<bool> = JoinSet::new();
        let mut summary = RunSummary::default();
        let mut intake_open = true;

        loop {
            if !intake_open && in_flight.is_empty() {
                tracing::debug!("Event stream closed, organizer shutting down");
                break;
            }

            tokio::select! {
                biased;

                // Check cancellation first
                _ = cancel.cancelled() => {
                    tracing::info!(in_flight = in_flight.len(), "Shutdown requested, no longer accepting events");
                    rx.close();
                    while let Some(event) = rx.recv().await {
                        let recorded = self.reject(event).await;
                        tally(&mut summary, Ok(recorded));
                    }
                    break;
                }

                // Accept new work if under concurrency limit
                event = rx.recv(), if intake_open && in_flight.len() < self.max_workers => {
                    match event {
                        Some(event) => self.dispatch(&mut in_flight, event),
                        None => intake_open = false,
                    }
                }

                // Reap completed tasks
                Some(joined) = in_flight.join_next() => {
                    tally(&mut summary, joined);
                }
            }
        }

        // Wait for any remaining in-flight runs
        while let Some(joined) = in_flight.join_next().await {
            tally(&mut summary, joined);
        }

        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Organizer stopped"
        );
        summary
    }

    fn dispatch(&self, in_flight: &mut JoinSet<bool>, event: FileEvent) {
        let orchestrator = self.orchestrator.clone();
        let sink = self.sink.clone();

        in_flight.spawn(async move {
            let event_id = event.id;
            let path = event.path.clone();

            // a panicking run still gets a result
            let result = match tokio::spawn(async move { orchestrator.process(event).await }).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(event_id = %event_id, path = %path.display(), error = %e, "Pipeline task panicked");
                    ProcessingResult::failed(
                        event_id,
                        path,
                        Stage::Failed,
                        ErrorKind::Unknown,
                        format!("Pipeline task failed: {}", e),
                    )
                }
            };
            sink.record(&result).await;
            result.success
        });
    }

    /// Answer an event that was accepted but never started
    async fn reject(&self, event: FileEvent) -> bool {
        tracing::warn!(event_id = %event.id, path = %event.path.display(), "Shutdown before processing, file left in place");
        let result = ProcessingResult::failed(
            event.id,
            event.path,
            Stage::Received,
            ErrorKind::Unknown,
            "Shutdown before processing",
        );
        self.sink.record(&result).await;
        result.success
    }
}

fn tally(summary: &mut RunSummary, joined: Result<bool, tokio::task::JoinError>) {
    match joined {
        Ok(true) => summary.succeeded += 1,
        Ok(false) => summary.failed += 1,
        Err(e) => {
            tracing::error!(error = %e, "Organizer task failed");
            summary.failed += 1;
        }
    }
}
