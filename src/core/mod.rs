//! Core pipeline logic.
//!
//! This module contains:
//! - Sanitizer: candidate name → filesystem-safe name
//! - Resolver: collision-free destination filenames
//! - Placement: exclusive move with retry
//! - Locks: per-source-path mutual exclusion
//! - Orchestrator: per-event state machine
//! - Service: concurrent dispatch of an event stream
//! - Sink: result reporting

pub mod locks;
pub mod orchestrator;
pub mod placement;
pub mod resolver;
pub mod retry;
pub mod sanitizer;
pub mod service;
pub mod sink;

// Re-export commonly used types
pub use locks::{PathGuard, PathLocks};
pub use orchestrator::{Orchestrator, Suggestion};
pub use placement::{classify_io_error, FileMover, FsMover, PlacementEngine, PlacementError};
pub use resolver::{resolve, resolve_with, SuffixExhausted};
pub use retry::RetryPolicy;
pub use sanitizer::sanitize;
pub use service::{Organizer, RunSummary};
pub use sink::{FanoutSink, JsonlSink, ResultSink, TracingSink};
