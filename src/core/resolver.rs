//! Conflict resolution by numeric suffixing.
//!
//! `name.ext` if free, otherwise the first free `name_1.ext`, `name_2.ext`, ...
//! Reads directory state only; the move that follows may still race with
//! another writer, which the placement engine handles.

use std::path::Path;

use thiserror::Error;

use crate::domain::{ResolvedDestination, SanitizedName};

/// Every suffix up to `u64::MAX` was taken
#[derive(Debug, Clone, Error)]
#[error("No free name for '{base}' in {dir}: suffix space exhausted")]
pub struct SuffixExhausted {
    pub dir: String,
    pub base: String,
}

/// Build `base.ext`, or just `base` when the extension is empty
pub fn filename_for(base: &str, extension: &str) -> String {
    if extension.is_empty() {
        base.to_string()
    } else {
        format!("{}.{}", base, extension)
    }
}

/// Resolve against the live filesystem
pub fn resolve(
    dir: &Path,
    desired: &SanitizedName,
    extension: &str,
) -> Result<ResolvedDestination, SuffixExhausted> {
    resolve_with(dir, desired, extension, |filename| {
        // only a successful lstat counts as taken; other errors surface at move time
        dir.join(filename).symlink_metadata().is_ok()
    })
}

/// Resolve using `is_taken` to test each candidate filename.
///
/// The extension is appended verbatim. Suffixes are tried in strictly
/// increasing order starting at 1.
pub fn resolve_with(
    dir: &Path,
    desired: &SanitizedName,
    extension: &str,
    mut is_taken: impl FnMut(&str) -> bool,
) -> Result<ResolvedDestination, SuffixExhausted> {
    let plain = filename_for(desired.as_str(), extension);
    if !is_taken(&plain) {
        return Ok(ResolvedDestination::new(dir, plain));
    }

    (1..=u64::MAX)
        .map(|n| filename_for(&format!("{}_{}", desired.as_str(), n), extension))
        .find(|candidate| !is_taken(candidate))
        .map(|filename| ResolvedDestination::new(dir, filename))
        .ok_or_else(|| SuffixExhausted {
            dir: dir.display().to_string(),
            base: desired.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sanitize;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn taken(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_free_name_is_unchanged() {
        let existing = taken(&["other.pdf"]);
        let dest = resolve_with(Path::new("/out"), &sanitize("revenue_summary"), "pdf", |n| {
            existing.contains(n)
        })
        .unwrap();
        assert_eq!(dest.filename, "revenue_summary.pdf");
        assert_eq!(dest.dir, Path::new("/out"));
    }

    #[test]
    fn test_first_suffix_is_one() {
        let existing = taken(&["revenue_summary.pdf"]);
        let dest = resolve_with(Path::new("/out"), &sanitize("revenue_summary"), "pdf", |n| {
            existing.contains(n)
        })
        .unwrap();
        assert_eq!(dest.filename, "revenue_summary_1.pdf");
    }

    #[test]
    fn test_smallest_unused_suffix() {
        let existing = taken(&["a.txt", "a_1.txt", "a_2.txt", "a_4.txt"]);
        let dest =
            resolve_with(Path::new("/out"), &sanitize("a"), "txt", |n| existing.contains(n)).unwrap();
        assert_eq!(dest.filename, "a_3.txt");
    }

    #[test]
    fn test_candidates_checked_in_increasing_order() {
        let mut checked = Vec::new();
        let existing = taken(&["x.pdf", "x_1.pdf", "x_2.pdf"]);
        resolve_with(Path::new("/out"), &sanitize("x"), "pdf", |n| {
            checked.push(n.to_string());
            existing.contains(n)
        })
        .unwrap();
        assert_eq!(checked, vec!["x.pdf", "x_1.pdf", "x_2.pdf", "x_3.pdf"]);
    }

    #[test]
    fn test_extension_is_verbatim() {
        let existing = taken(&["scan.PDF"]);
        let dest =
            resolve_with(Path::new("/out"), &sanitize("scan"), "PDF", |n| existing.contains(n)).unwrap();
        assert_eq!(dest.filename, "scan_1.PDF");
    }

    #[test]
    fn test_no_extension() {
        let dest = resolve_with(Path::new("/out"), &sanitize("notes"), "", |_| false).unwrap();
        assert_eq!(dest.filename, "notes");
    }

    #[test]
    fn test_resolve_against_filesystem() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("report.pdf"), b"1").unwrap();
        std::fs::write(temp.path().join("report_1.pdf"), b"2").unwrap();

        let dest = resolve(temp.path(), &sanitize("report"), "pdf").unwrap();
        assert_eq!(dest.filename, "report_2.pdf");
        assert!(!dest.path().exists());
    }
}
