//! Per-path mutual exclusion.
//!
//! At most one pipeline run may hold a given source path. Entries are
//! created on demand and evicted when the last holder or waiter lets go,
//! so the map only grows with the number of paths currently in flight.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Registry = Arc<Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>>;

/// Registry of per-path locks, cheap to clone
#[derive(Debug, Clone, Default)]
pub struct PathLocks {
    registry: Registry,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive ownership of `path`.
    ///
    /// The path is canonicalized when possible so different spellings of the
    /// same file share one lock; a path that no longer exists is used as given.
    pub async fn acquire(&self, path: &Path) -> PathGuard {
        let key = tokio::fs::canonicalize(path)
            .await
            .unwrap_or_else(|_| path.to_path_buf());
        self.acquire_key(key).await
    }

    async fn acquire_key(&self, key: PathBuf) -> PathGuard {
        let lock = {
            let mut map = lock_registry(&self.registry);
            map.entry(key.clone()).or_default().clone()
        };

        let guard = lock.clone().lock_owned().await;

        PathGuard {
            key,
            lock,
            guard: Some(guard),
            registry: self.registry.clone(),
        }
    }

    /// Number of paths currently held or waited on
    pub fn len(&self) -> usize {
        lock_registry(&self.registry).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// A poisoned registry only means another thread panicked mid-insert; the map is still usable.
fn lock_registry(
    registry: &Registry,
) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Arc<AsyncMutex<()>>>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Exclusive hold on one path; released on drop
#[derive(Debug)]
pub struct PathGuard {
    key: PathBuf,
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
    registry: Registry,
}

impl PathGuard {
    /// Canonical key this guard holds
    pub fn path(&self) -> &Path {
        &self.key
    }
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        self.guard.take();

        let mut map = lock_registry(&self.registry);
        // map entry + our handle: nobody else is holding or waiting
        if Arc::strong_count(&self.lock) == 2 {
            map.remove(&self.key);
        }
    }
}
