//! Sanitizer and Resolver Integration Tests
//!
//! Naming invariants over a spread of hostile candidate names.

use std::collections::HashSet;

use docsort::core::{resolve, resolve_with, sanitize};
use tempfile::TempDir;

const HOSTILE: &[&str] = &[
    "a/b:c*d",
    "../../etc/passwd",
    "C:\\Windows\\system32",
    "what? <really> |pipe| \"quoted\"",
    "   ",
    "",
    "___",
    "...",
    "-leading-and-trailing-",
    "tab\tnew\nline",
    "emoji 🎉 party",
    "日本語のファイル",
    "name\0with\0nul",
    "Quarterly Report (final) v2.1",
];

fn is_safe(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[test]
fn test_sanitized_names_are_safe_and_non_empty() {
    for candidate in HOSTILE {
        let name = sanitize(candidate);
        assert!(is_safe(name.as_str()), "{:?} -> {:?}", candidate, name.as_str());
        assert!(!name.as_str().contains('/'));
        assert!(!name.as_str().contains(".."), "{:?} -> {:?}", candidate, name.as_str());
    }
}

#[test]
fn test_sanitize_is_idempotent() {
    for candidate in HOSTILE {
        let once = sanitize(candidate);
        let twice = sanitize(once.as_str());
        assert_eq!(once.as_str(), twice.as_str(), "{:?}", candidate);
    }
}

#[test]
fn test_example_replacement() {
    assert_eq!(sanitize("a/b:c*d").as_str(), "a_b_c_d");
    assert_eq!(sanitize("Quarterly Report (final) v2.1").as_str(), "Quarterly_Report_final_v2.1");
}

#[test]
fn test_resolve_picks_smallest_free_suffix() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    for existing in ["report.pdf", "report_1.pdf", "report_3.pdf"] {
        std::fs::write(dir.join(existing), b"x").unwrap();
    }

    let dest = resolve(dir, &sanitize("report"), "pdf").unwrap();
    assert_eq!(dest.filename, "report_2.pdf");
    assert_eq!(dest.path(), dir.join("report_2.pdf"));

    // different extension is a different name
    let dest = resolve(dir, &sanitize("report"), "txt").unwrap();
    assert_eq!(dest.filename, "report.txt");
}

#[test]
fn test_resolve_with_checks_in_order() {
    let taken: HashSet<String> = (0..50)
        .map(|n| if n == 0 { "scan.PDF".to_string() } else { format!("scan_{}.PDF", n) })
        .collect();

    let mut checked = Vec::new();
    let dest = resolve_with(std::path::Path::new("/out"), &sanitize("scan"), "PDF", |name| {
        checked.push(name.to_string());
        taken.contains(name)
    })
    .unwrap();

    assert_eq!(dest.filename, "scan_50.PDF");
    assert_eq!(checked.len(), 51);
    assert_eq!(checked[0], "scan.PDF");
    assert_eq!(checked[1], "scan_1.PDF");
}
