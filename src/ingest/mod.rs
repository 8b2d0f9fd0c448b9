//! Event source.
//!
//! ```text
//! watch_dir → DirectoryWatcher → FileEvent → Organizer
//! ```

pub mod watcher;

pub use watcher::{DirectoryWatcher, WatchHandle, WatcherConfig, WatcherError};
