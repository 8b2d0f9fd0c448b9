//! Download directory watcher.
//!
//! Watches a single directory (non-recursively) for new PDF and text files
//! and emits a [`FileEvent`] once a file's size has stopped changing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ResolvedConfig;
use crate::domain::{DetectedType, FileEvent};

/// Errors that can occur with the watcher
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("Watch path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Invalid ignore pattern {pattern:?}: {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("Notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for the watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Directory to watch
    pub watch_dir: PathBuf,

    /// How long a file's size must hold still before it is emitted
    pub stability_delay: Duration,

    /// Types to emit events for
    pub file_types: Vec<DetectedType>,

    /// Paths matching any of these are skipped
    pub ignore_patterns: Vec<glob::Pattern>,
}

impl WatcherConfig {
    pub fn new(watch_dir: impl Into<PathBuf>) -> Self {
        Self {
            watch_dir: watch_dir.into(),
            stability_delay: Duration::from_millis(500),
            file_types: vec![DetectedType::Pdf, DetectedType::Text],
            ignore_patterns: Vec::new(),
        }
    }

    pub fn from_config(config: &ResolvedConfig) -> Result<Self, WatcherError> {
        let ignore_patterns = config
            .monitoring
            .ignore_patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| WatcherError::Pattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            watch_dir: config.monitoring.watch_dir.clone(),
            stability_delay: Duration::from_millis(config.monitoring.stability_delay_ms),
            file_types: config.monitoring.file_types.clone(),
            ignore_patterns,
        })
    }

    /// Whether `path` is a file type we emit and its name is not ignored
    pub fn accepts(&self, path: &Path) -> bool {
        let Some(detected) = DetectedType::from_path(path) else {
            return false;
        };
        if !self.file_types.contains(&detected) {
            return false;
        }

        // the watch is non-recursive, so only the name is matched
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        !self.ignore_patterns.iter().any(|p| p.matches(file_name))
    }
}

/// Directory watcher with stability checking
pub struct DirectoryWatcher {
    config: WatcherConfig,
}

impl DirectoryWatcher {
    pub fn new(config: WatcherConfig) -> Self {
        Self { config }
    }

    /// Get the current configuration
    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Create the watch directory if missing, then watch it in a background
    /// task until `cancel` fires. Stable files are sent on `events`.
    pub async fn watch(
        &self,
        events: mpsc::Sender<FileEvent>,
        cancel: CancellationToken,
    ) -> Result<WatchHandle, WatcherError> {
        let dir = &self.config.watch_dir;
        tokio::fs::create_dir_all(dir).await?;
        if !tokio::fs::metadata(dir).await?.is_dir() {
            return Err(WatcherError::NotADirectory(dir.clone()));
        }

        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<DebounceEventResult>();
        let mut debouncer = new_debouncer(debounce_for(self.config.stability_delay), move |res: DebounceEventResult| {
            // receiver gone means the watch loop has exited
            let _ = raw_tx.send(res);
        })?;
        debouncer.watcher().watch(dir, RecursiveMode::NonRecursive)?;

        tracing::info!(dir = %dir.display(), "Watching for new documents");

        let config = self.config.clone();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            // keep the OS watcher alive for the life of the loop
            let _debouncer = debouncer;
            run_watcher(config, raw_rx, events, task_cancel).await;
        });

        Ok(WatchHandle { cancel, task })
    }
}

fn debounce_for(stability_delay: Duration) -> Duration {
    stability_delay.clamp(Duration::from_millis(50), Duration::from_millis(500))
}

/// Handle to control the watcher
pub struct WatchHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Stop the watcher and wait for its loop to exit
    pub async fn stop(self) -> Result<()> {
        self.cancel.cancel();
        self.task.await?;
        Ok(())
    }
}

/// Internal watcher loop
async fn run_watcher(
    config: WatcherConfig,
    mut raw_rx: mpsc::UnboundedReceiver<DebounceEventResult>,
    events: mpsc::Sender<FileEvent>,
    cancel: CancellationToken,
) {
    // Track files being stabilized (path -> (size, last change))
    let mut pending: HashMap<PathBuf, (u64, Instant)> = HashMap::new();
    let mut tick = tokio::time::interval((config.stability_delay / 4).max(Duration::from_millis(25)));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Watcher stopping");
                break;
            }
            raw = raw_rx.recv() => match raw {
                Some(Ok(batch)) => {
                    for event in batch {
                        if !config.accepts(&event.path) {
                            continue;
                        }
                        if let Ok(metadata) = tokio::fs::metadata(&event.path).await {
                            if metadata.is_file() {
                                pending
                                    .entry(event.path)
                                    .or_insert_with(|| (metadata.len(), Instant::now()));
                            }
                        }
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(error = ?e, "Watcher error");
                }
                None => {
                    tracing::error!("Watcher channel disconnected");
                    break;
                }
            },
            _ = tick.tick() => {
                let stable = check_stability(&mut pending, config.stability_delay).await;
                for path in stable {
                    let Some(event) = FileEvent::from_path(&path) else {
                        continue;
                    };
                    tracing::info!(file = %event.file_name(), event_id = %event.id, "New document detected");
                    if events.send(event).await.is_err() {
                        tracing::debug!("Event receiver dropped, stopping watcher");
                        return;
                    }
                }
            }
        }
    }
}

/// Remove and return files whose size has held, non-zero, for `delay`.
/// Files that vanished are dropped; files still growing restart their clock.
async fn check_stability(pending: &mut HashMap<PathBuf, (u64, Instant)>, delay: Duration) -> Vec<PathBuf> {
    let now = Instant::now();
    let mut stable = Vec::new();
    let mut gone = Vec::new();

    for (path, (last_size, last_change)) in pending.iter_mut() {
        let size = match tokio::fs::metadata(path).await {
            Ok(m) if m.is_file() => m.len(),
            _ => {
                gone.push(path.clone());
                continue;
            }
        };

        if size != *last_size {
            *last_size = size;
            *last_change = now;
        } else if size > 0 && now.duration_since(*last_change) >= delay {
            stable.push(path.clone());
        }
    }

    for path in gone.iter().chain(stable.iter()) {
        pending.remove(path);
    }
    stable
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_for(dir: &Path) -> WatcherConfig {
        WatcherConfig {
            stability_delay: Duration::from_millis(100),
            ignore_patterns: vec![
                glob::Pattern::new("**/.*").unwrap(),
                glob::Pattern::new("**/~$*").unwrap(),
            ],
            ..WatcherConfig::new(dir)
        }
    }

    #[test]
    fn test_accepts() {
        let config = config_for(Path::new("/downloads"));

        assert!(config.accepts(Path::new("/downloads/report.pdf")));
        assert!(config.accepts(Path::new("/downloads/NOTES.TXT")));
        assert!(config.accepts(Path::new("/downloads/readme.text")));
        assert!(!config.accepts(Path::new("/downloads/photo.jpg")));
        assert!(!config.accepts(Path::new("/downloads/noextension")));
        assert!(!config.accepts(Path::new("/downloads/.partial.pdf")));
        assert!(!config.accepts(Path::new("/downloads/~$draft.txt")));

        let pdf_only = WatcherConfig {
            file_types: vec![DetectedType::Pdf],
            ..config
        };
        assert!(!pdf_only.accepts(Path::new("/downloads/notes.txt")));
    }

    #[tokio::test]
    async fn test_check_stability() {
        let temp = TempDir::new().unwrap();
        let growing = temp.path().join("growing.pdf");
        let empty = temp.path().join("empty.pdf");
        let done = temp.path().join("done.pdf");
        std::fs::write(&growing, b"12345").unwrap();
        std::fs::write(&empty, b"").unwrap();
        std::fs::write(&done, b"complete").unwrap();

        let long_ago = Instant::now() - Duration::from_secs(10);
        let mut pending = HashMap::new();
        pending.insert(growing.clone(), (1, long_ago));
        pending.insert(empty.clone(), (0, long_ago));
        pending.insert(done.clone(), (8, long_ago));
        pending.insert(temp.path().join("vanished.pdf"), (3, long_ago));

        let stable = check_stability(&mut pending, Duration::from_millis(100)).await;

        assert_eq!(stable, vec![done]);
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[&growing].0, 5);
        assert!(pending.contains_key(&empty));
    }

    #[tokio::test]
    async fn test_watch_emits_new_file() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("Downloads");

        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let handle = DirectoryWatcher::new(config_for(&dir))
            .watch(tx, cancel.clone())
            .await
            .unwrap();
        assert!(dir.is_dir());

        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(dir.join("ignored.jpg"), b"jpeg").unwrap();
        std::fs::write(dir.join("invoice.pdf"), b"%PDF-1.4").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("watcher should emit within timeout")
            .unwrap();
        assert_eq!(event.path.file_name().unwrap(), "invoice.pdf");
        assert_eq!(event.detected_type, DetectedType::Pdf);

        handle.stop().await.unwrap();
    }
}
