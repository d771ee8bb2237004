//! Lexical fallback keyword extraction.
//!
//! Minimal strategy for deployments without the linguistic lexicon: strip
//! punctuation, split on whitespace, drop a small stopword set and any token
//! of fewer than three characters, then rank by count.

use super::{ExtractionStrategy, rank_by_count};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Compact stopword set for the fallback path.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is",
    "it", "its", "of", "on", "that", "the", "to", "was", "will", "with", "this", "these",
    "they", "them", "their", "there", "then", "than", "or", "but", "if", "when", "where",
    "why", "how", "all", "any", "both", "each", "few", "more", "most", "other", "some",
    "such", "no", "nor", "not", "only", "own", "same", "so", "too", "very", "can", "could",
    "should", "would", "may", "might", "must", "shall",
];

/// Everything that is not a word character or whitespace.
static PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| {
    #[expect(clippy::expect_used, reason = "pattern is constant and valid")]
    let re = Regex::new(r"[^\w\s]").expect("valid pattern");
    re
});

/// Lexical extraction strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalExtractor;

impl LexicalExtractor {
    /// Create the extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ExtractionStrategy for LexicalExtractor {
    fn extract(&self, text: &str, top_n: usize) -> Vec<String> {
        let stopwords = stopword_set();
        let lowered = text.to_lowercase();
        let stripped = PUNCTUATION.replace_all(&lowered, " ");
        let candidates: Vec<String> = stripped
            .split_whitespace()
            .filter(|word| word.len() > 2 && !stopwords.contains(word))
            .map(str::to_owned)
            .collect();
        rank_by_count(&candidates, top_n)
    }

    fn name(&self) -> &'static str {
        "lexical"
    }
}

/// Shared stopword set, built once.
fn stopword_set() -> &'static HashSet<&'static str> {
    static SET: LazyLock<HashSet<&'static str>> =
        LazyLock::new(|| STOPWORDS.iter().copied().collect());
    &SET
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_stopwords() {
        let extractor = LexicalExtractor::new();
        let keywords = extractor.extract("the watch, with a leather strap!", 10);
        assert_eq!(keywords, ["watch", "leather", "strap"]);
    }

    #[test]
    fn drops_two_character_tokens() {
        let extractor = LexicalExtractor::new();
        let keywords = extractor.extract("hd tv stand", 10);
        assert_eq!(keywords, ["stand"]);
    }

    #[test]
    fn counts_drive_the_ranking() {
        let extractor = LexicalExtractor::new();
        let keywords = extractor.extract("mug plate mug bowl mug plate", 10);
        assert_eq!(keywords, ["mug", "plate", "bowl"]);
    }

    #[test]
    fn empty_text_yields_no_keywords() {
        let extractor = LexicalExtractor::new();
        assert!(extractor.extract("", 10).is_empty());
        assert!(extractor.extract("  \t ", 10).is_empty());
    }
}
