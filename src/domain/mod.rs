//! Domain types for the docsort pipeline.
//!
//! This module contains the core data structures:
//! - FileEvent: A newly created file reported by the event source
//! - Naming: Content samples, candidate and sanitized names, destinations
//! - Result: The terminal outcome of one pipeline run

pub mod file_event;
pub mod naming;
pub mod result;

// Re-export commonly used types
pub use file_event::{DetectedType, FileEvent};
pub use naming::{CandidateName, ContentSample, ResolvedDestination, SanitizedName};
pub use result::{ErrorDetail, ErrorKind, ProcessingResult, Stage};
