//! Linguistic keyword extraction.
//!
//! Lemmatises tokens with a small irregular-noun table plus English plural
//! suffix rules, drops stopwords from a large lexicon, and rejects tokens
//! whose shape marks them as noise: pure numbers, number-unit fusions,
//! negative integers, and product-code tokens mixing digits with letters.

use super::{ExtractionStrategy, rank_by_count};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Stopword lexicon for the linguistic strategy.
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "nor", "for", "yet", "so", "i", "you", "he", "she",
    "it", "we", "they", "me", "him", "her", "us", "them", "my", "your", "his", "its", "our",
    "their", "mine", "yours", "hers", "ours", "theirs", "this", "that", "these", "those", "who",
    "whom", "which", "what", "whose", "is", "am", "are", "was", "were", "be", "been", "being",
    "have", "has", "had", "having", "do", "does", "did", "doing", "will", "would", "shall",
    "should", "can", "could", "may", "might", "must", "of", "in", "on", "at", "to", "from", "by",
    "with", "about", "against", "between", "into", "through", "during", "before", "after",
    "above", "below", "up", "down", "out", "off", "over", "under", "again", "further", "here",
    "there", "where", "when", "why", "how", "all", "each", "every", "both", "few", "more",
    "most", "other", "some", "any", "no", "not", "only", "own", "same", "than", "too", "very",
    "just", "also", "now", "then", "once", "always", "never", "if", "because", "as", "until",
    "while", "although", "though", "yes", "maybe", "such", "per", "via", "etc",
];

/// Irregular noun plurals the suffix rules cannot reach.
const IRREGULAR_LEMMAS: &[(&str, &str)] = &[
    ("men", "man"),
    ("women", "woman"),
    ("children", "child"),
    ("feet", "foot"),
    ("teeth", "tooth"),
    ("geese", "goose"),
    ("mice", "mouse"),
];

/// Pure numeric token, optionally with thousands/decimal separators.
static NUMERIC: LazyLock<Regex> = LazyLock::new(|| compiled(r"^[\d.,]+$"));

/// Number fused with a trailing unit code, e.g. `3x` or `75%`.
static NUMERIC_UNIT: LazyLock<Regex> = LazyLock::new(|| compiled(r"^[\d.,]+\s*[a-zA-Z%]+$"));

/// Negative integer.
static NEGATIVE: LazyLock<Regex> = LazyLock::new(|| compiled(r"^-[0-9]+$"));

/// Compile a constant pattern.
#[expect(clippy::expect_used, reason = "patterns are constant and valid")]
fn compiled(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid pattern")
}

/// Linguistic extraction strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinguisticExtractor;

impl LinguisticExtractor {
    /// Create the extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Whether the linguistic lexicon is usable in this process.
    #[must_use]
    pub const fn available() -> bool {
        // The lexicon and lemma rules are compiled in.
        true
    }
}

impl ExtractionStrategy for LinguisticExtractor {
    fn extract(&self, text: &str, top_n: usize) -> Vec<String> {
        let stopwords = stopword_set();
        let candidates: Vec<String> = text
            .split_whitespace()
            .filter(|token| accepts(token))
            .map(lemmatize)
            .filter(|lemma| lemma.len() >= 2 && !stopwords.contains(lemma.as_str()))
            .collect();
        rank_by_count(&candidates, top_n)
    }

    fn name(&self) -> &'static str {
        "linguistic"
    }
}

/// Shared stopword set, built once.
fn stopword_set() -> &'static HashSet<&'static str> {
    static SET: LazyLock<HashSet<&'static str>> =
        LazyLock::new(|| STOPWORDS.iter().copied().collect());
    &SET
}

/// Token-shape filter applied before lemmatisation.
fn accepts(token: &str) -> bool {
    if !token.chars().any(char::is_alphanumeric) {
        return false;
    }
    if NUMERIC.is_match(token) || NUMERIC_UNIT.is_match(token) || NEGATIVE.is_match(token) {
        return false;
    }
    // Product codes mix digits with letters, e.g. `sx-1080` or `mk3`.
    let has_digit = token.chars().any(|c| c.is_ascii_digit());
    let has_alpha = token.chars().any(char::is_alphabetic);
    !(has_digit && has_alpha)
}

/// Rule-based English lemmatisation, plural forms only.
fn lemmatize(token: &str) -> String {
    let lower = token.to_lowercase();
    if let Some((_, lemma)) = IRREGULAR_LEMMAS.iter().find(|(plural, _)| *plural == lower) {
        return (*lemma).to_owned();
    }
    if let Some(stem) = lower.strip_suffix("ies")
        && stem.len() >= 2
    {
        return format!("{stem}y");
    }
    for suffix in ["sses", "shes", "ches", "xes", "zes"] {
        if let Some(stem) = lower.strip_suffix("es")
            && lower.ends_with(suffix)
            && stem.len() >= 2
        {
            return stem.to_owned();
        }
    }
    if lower.len() > 3
        && let Some(stem) = lower.strip_suffix('s')
        && !stem.ends_with(['s', 'u', 'i'])
    {
        return stem.to_owned();
    }
    lower
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("watches", "watch")]
    #[case("babies", "baby")]
    #[case("straps", "strap")]
    #[case("glasses", "glass")]
    #[case("children", "child")]
    #[case("glass", "glass")]
    #[case("gas", "gas")]
    #[case("Leather", "leather")]
    fn lemmatisation_cases(#[case] token: &str, #[case] lemma: &str) {
        assert_eq!(lemmatize(token), lemma);
    }

    #[rstest]
    #[case("120")]
    #[case("1,299.99")]
    #[case("-40")]
    #[case("75%")]
    #[case("mk3")]
    #[case("sx-1080")]
    #[case("...")]
    fn noise_shapes_are_rejected(#[case] token: &str) {
        assert!(!accepts(token));
    }

    #[rstest]
    #[case("leather")]
    #[case("wrist-watch")]
    #[case("stainless")]
    fn word_shapes_are_accepted(#[case] token: &str) {
        assert!(accepts(token));
    }

    #[test]
    fn stopwords_and_short_lemmas_are_dropped() {
        let extractor = LinguisticExtractor::new();
        let keywords = extractor.extract("the watch is on a leather strap", 10);
        assert_eq!(keywords, ["watch", "leather", "strap"]);
    }

    #[test]
    fn repeated_lemmas_rank_first() {
        let extractor = LinguisticExtractor::new();
        let keywords = extractor.extract("strap dial strap case strap dial", 2);
        assert_eq!(keywords, ["strap", "dial"]);
    }
}
