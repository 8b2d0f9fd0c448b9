//! Filename sanitization.
//!
//! Turns an arbitrary candidate name into one that is safe on every
//! filesystem we target. Pure: no filesystem access, never fails.

use chrono::Utc;

use crate::domain::SanitizedName;

/// Replacement for every character outside the safe set
pub const REPLACEMENT: char = '_';

/// Longest base name we emit, in bytes. Leaves room for `_N.ext`
/// under the usual 255-byte filename limit.
pub const MAX_NAME_BYTES: usize = 200;

fn is_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn is_separator(c: char) -> bool {
    matches!(c, '_' | '-' | '.')
}

/// Sanitize a candidate name, falling back to `file_<unix-timestamp>`
/// when nothing survives.
pub fn sanitize(candidate: &str) -> SanitizedName {
    sanitize_or_else(candidate, || format!("file_{}", Utc::now().timestamp()))
}

/// Sanitize with a caller-supplied fallback for empty results.
///
/// The fallback itself is sanitized, and if that is empty too the
/// result is `file`.
pub fn sanitize_or_else(candidate: &str, fallback: impl FnOnce() -> String) -> SanitizedName {
    let cleaned = clean(candidate);
    if !cleaned.is_empty() {
        return SanitizedName::from_sanitized(cleaned);
    }

    let fallback = clean(&fallback());
    if fallback.is_empty() {
        SanitizedName::from_sanitized("file".to_string())
    } else {
        SanitizedName::from_sanitized(fallback)
    }
}

fn clean(candidate: &str) -> String {
    let mut out = String::with_capacity(candidate.len());

    for c in candidate.chars() {
        let c = if is_safe(c) { c } else { REPLACEMENT };
        // collapse runs of the replacement character
        if c == REPLACEMENT && out.ends_with(REPLACEMENT) {
            continue;
        }
        out.push(c);
    }

    let mut trimmed = out.trim_matches(is_separator);

    if trimmed.len() > MAX_NAME_BYTES {
        // every char is ASCII here, so any byte index is a boundary
        trimmed = trimmed[..MAX_NAME_BYTES].trim_end_matches(is_separator);
    }

    trimmed.to_string()
}
