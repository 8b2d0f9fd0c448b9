//! docsort - content-based file organizer
//!
//! Watches a download directory, reads a sample of each new PDF or text
//! file, derives a descriptive name from it and moves the file into an
//! organized directory without ever overwriting or losing data.
//!
//! # Architecture
//!
//! ```text
//! DirectoryWatcher → Organizer → Orchestrator
//!                                  ├─ ContentSampler   (sample text)
//!                                  ├─ NameGenerator    (candidate name)
//!                                  └─ PlacementEngine  (sanitize → resolve → move with retry)
//!                                → ResultSink
//! ```
//!
//! # Modules
//!
//! - `adapters`: Content sampling and name generation (simulated, remote LLM)
//! - `core`: Pipeline logic (Sanitizer, Resolver, Placement, Orchestrator)
//! - `domain`: Data structures (FileEvent, ProcessingResult, names)
//! - `ingest`: Directory watcher producing file events
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Organize new downloads until Ctrl-C
//! docsort watch
//!
//! # Organize specific files once
//! docsort process ~/Downloads/scan001.pdf
//!
//! # Preview a name without moving anything
//! docsort suggest ~/Downloads/scan001.pdf
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;

// Re-export main types at crate root for convenience
pub use crate::core::{Orchestrator, Organizer, PlacementEngine, RetryPolicy};
pub use domain::{ErrorKind, FileEvent, ProcessingResult};
pub use ingest::{DirectoryWatcher, WatcherConfig};
