//! Offline name generator using a keyword heuristic.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::domain::{CandidateName, ContentSample};

use super::{NameGenError, NameGenerator};

static KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-zA-Z]{4,}\b").expect("keyword pattern is valid"));

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "that", "this", "with", "from", "have", "will", "your", "are", "not",
    "but", "can", "was", "were", "been", "has", "had", "does", "did", "would", "could", "should",
    "about", "into", "through", "during", "before", "after", "above", "below", "between",
    "under", "again", "further", "then", "once",
];

/// Picks the first few distinctive words of the sample
#[derive(Debug, Clone)]
pub struct SimulatedNamer {
    /// Words joined into the name
    max_words: usize,
}

impl Default for SimulatedNamer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedNamer {
    pub fn new() -> Self {
        Self { max_words: 3 }
    }

    /// Lowercased keywords of four or more letters, stop words removed,
    /// first occurrence order, no repeats
    pub fn keywords(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let mut seen = HashSet::new();

        KEYWORD
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|w| !STOP_WORDS.contains(w))
            .filter(|w| seen.insert(w.to_string()))
            .take(self.max_words)
            .map(str::to_string)
            .collect()
    }

    /// Heuristic name, or `None` when the text has nothing usable
    pub fn suggest(&self, text: &str) -> Option<String> {
        let keywords = self.keywords(text);
        if !keywords.is_empty() {
            return Some(keywords.join("_"));
        }

        // no keywords: first few words, alphanumerics only
        let name: String = text
            .split_whitespace()
            .take(self.max_words)
            .collect::<Vec<_>>()
            .join("_")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect::<String>()
            .to_lowercase();

        let name = name.trim_matches('_').to_string();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}

#[async_trait]
impl NameGenerator for SimulatedNamer {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn try_generate(&self, sample: &ContentSample) -> Result<CandidateName, NameGenError> {
        self.suggest(&sample.text)
            .map(CandidateName::new)
            .ok_or(NameGenError::NoKeywords)
    }
}
