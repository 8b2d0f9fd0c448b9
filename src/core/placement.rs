//! Placement engine: sanitize, resolve conflicts, move with retry.
//!
//! A placement either lands the file at a fresh destination or leaves the
//! source exactly where it was. Moves never overwrite: the destination is
//! created exclusively, and an `AlreadyExists` from a concurrent writer
//! triggers a fresh conflict resolution.

use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::{CandidateName, ErrorKind, ResolvedDestination};

use super::resolver;
use super::retry::RetryPolicy;
use super::sanitizer::sanitize;

/// Placement failure; the source file is untouched
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct PlacementError {
    pub kind: ErrorKind,
    pub message: String,
    /// Move attempts made before giving up (0 if we never tried)
    pub attempts: u32,
}

impl PlacementError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            attempts: 0,
        }
    }

    fn after(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

/// Map an I/O error from a move to a placement error kind.
///
/// `source_exists` disambiguates `NotFound`: a missing source is
/// `SourceMissing`, anything else is a bad destination.
pub fn classify_io_error(err: &io::Error, source_exists: bool) -> ErrorKind {
    if is_sharing_violation(err) {
        return ErrorKind::TransientLocked;
    }

    match err.kind() {
        io::ErrorKind::PermissionDenied
        | io::ErrorKind::ResourceBusy
        | io::ErrorKind::WouldBlock
        | io::ErrorKind::ExecutableFileBusy
        | io::ErrorKind::AlreadyExists => ErrorKind::TransientLocked,
        io::ErrorKind::NotFound if !source_exists => ErrorKind::SourceMissing,
        io::ErrorKind::NotFound
        | io::ErrorKind::InvalidInput
        | io::ErrorKind::InvalidFilename
        | io::ErrorKind::NotADirectory
        | io::ErrorKind::IsADirectory
        | io::ErrorKind::ReadOnlyFilesystem => ErrorKind::DestinationInvalid,
        io::ErrorKind::StorageFull | io::ErrorKind::QuotaExceeded => ErrorKind::DiskFull,
        _ => ErrorKind::Unknown,
    }
}

#[cfg(windows)]
fn is_sharing_violation(err: &io::Error) -> bool {
    // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
    matches!(err.raw_os_error(), Some(32) | Some(33))
}

#[cfg(not(windows))]
fn is_sharing_violation(_err: &io::Error) -> bool {
    false
}

/// Moves a file to a destination that must not exist yet
#[async_trait]
pub trait FileMover: Send + Sync {
    /// Move `source` to `dest`, failing with `AlreadyExists` rather than
    /// replacing an existing entry. On error the source must still be in
    /// place and `dest` must not have been left behind.
    async fn move_exclusive(&self, source: &Path, dest: &Path) -> io::Result<()>;
}

/// Filesystem mover: hard link + unlink, or exclusive copy across devices
#[derive(Debug, Clone, Default)]
pub struct FsMover;

#[async_trait]
impl FileMover for FsMover {
    async fn move_exclusive(&self, source: &Path, dest: &Path) -> io::Result<()> {
        match fs::hard_link(source, dest).await {
            Ok(()) => {
                if let Err(e) = fs::remove_file(source).await {
                    // undo so the source stays the only copy
                    discard_destination(source, dest).await;
                    return Err(e);
                }
                Ok(())
            }
            Err(e) if needs_copy(&e) => {
                debug!(source = %source.display(), error = %e, "Hard link unavailable, copying");
                copy_exclusive(source, dest).await
            }
            Err(e) => Err(e),
        }
    }
}

/// Link failures that mean "use a copy instead"
fn needs_copy(err: &io::Error) -> bool {
    // EXDEV is 18 on Linux and macOS; EPERM (1) is what filesystems
    // without hard link support report
    err.kind() == io::ErrorKind::CrossesDevices
        || err.kind() == io::ErrorKind::Unsupported
        || matches!(err.raw_os_error(), Some(18) | Some(1))
}

async fn copy_exclusive(source: &Path, dest: &Path) -> io::Result<()> {
    let mut reader = fs::File::open(source).await?;
    let mut writer = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .await?;

    let copied = async {
        tokio::io::copy(&mut reader, &mut writer).await?;
        writer.flush().await?;
        writer.sync_all().await
    }
    .await;

    drop(writer);
    drop(reader);

    if let Err(e) = copied {
        discard_destination(source, dest).await;
        return Err(e);
    }

    if let Err(e) = fs::remove_file(source).await {
        discard_destination(source, dest).await;
        return Err(e);
    }

    Ok(())
}

/// Remove a destination written by a move that then failed. Returns
/// whether the destination is gone.
async fn discard_destination(source: &Path, dest: &Path) -> bool {
    match fs::remove_file(dest).await {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => {
            error!(
                source = %source.display(),
                dest = %dest.display(),
                error = %e,
                "Failed to undo partial move, destination left as a duplicate"
            );
            false
        }
    }
}

/// Places files into a destination directory
pub struct PlacementEngine {
    retry: RetryPolicy,
    mover: Arc<dyn FileMover>,
    shutdown: CancellationToken,
}

impl PlacementEngine {
    /// Engine with the filesystem mover and no shutdown signal
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            retry,
            mover: Arc::new(FsMover),
            shutdown: CancellationToken::new(),
        }
    }

    /// Swap the mover (tests, alternative storage)
    pub fn with_mover(mut self, mover: Arc<dyn FileMover>) -> Self {
        self.mover = mover;
        self
    }

    /// Stop retrying once this token is cancelled
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Place `source` into `dir` under a sanitized, collision-free form of
    /// `candidate`, keeping `extension` verbatim.
    pub async fn place(
        &self,
        source: &Path,
        dir: &Path,
        candidate: &CandidateName,
        extension: &str,
    ) -> Result<ResolvedDestination, PlacementError> {
        fs::create_dir_all(dir).await.map_err(|e| {
            let kind = match classify_io_error(&e, true) {
                ErrorKind::DiskFull => ErrorKind::DiskFull,
                _ => ErrorKind::DestinationInvalid,
            };
            PlacementError::new(
                kind,
                format!("Failed to create destination directory {}: {}", dir.display(), e),
            )
        })?;

        let sanitized = sanitize(&candidate.raw);
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let dest = resolver::resolve(dir, &sanitized, extension).map_err(|e| {
                PlacementError::new(ErrorKind::DestinationInvalid, e.to_string()).after(attempt - 1)
            })?;
            let dest_path = dest.path();

            let err = match self.mover.move_exclusive(source, &dest_path).await {
                Ok(()) => {
                    info!(
                        source = %source.display(),
                        dest = %dest_path.display(),
                        attempt,
                        "File placed"
                    );
                    return Ok(dest);
                }
                Err(e) => e,
            };

            let kind = classify_io_error(&err, source.exists());

            if !kind.is_transient() {
                error!(
                    source = %source.display(),
                    dest = %dest_path.display(),
                    kind = %kind,
                    error = %err,
                    "Placement failed"
                );
                return Err(PlacementError::new(
                    kind,
                    format!("Failed to move {}: {}", source.display(), err),
                )
                .after(attempt));
            }

            if !self.retry.should_retry(attempt) {
                error!(
                    source = %source.display(),
                    attempts = attempt,
                    error = %err,
                    "Placement retries exhausted"
                );
                return Err(PlacementError::new(
                    ErrorKind::TransientLocked,
                    format!(
                        "Failed to move {} after {} attempts: {}",
                        source.display(),
                        attempt,
                        err
                    ),
                )
                .after(attempt));
            }

            if err.kind() == io::ErrorKind::AlreadyExists {
                // another run claimed the name between resolve and move
                warn!(
                    dest = %dest_path.display(),
                    attempt,
                    "Destination taken concurrently, resolving again"
                );
                continue;
            }

            let delay = self.retry.delay_for_attempt(attempt);
            warn!(
                source = %source.display(),
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "File busy, retrying"
            );

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    warn!(source = %source.display(), attempt, "Shutdown during retry wait, leaving file in place");
                    return Err(PlacementError::new(
                        ErrorKind::TransientLocked,
                        format!(
                            "Gave up on {} after {} attempts: shutting down",
                            source.display(),
                            attempt
                        ),
                    )
                    .after(attempt));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
