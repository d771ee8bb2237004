//! Keyword extraction from normalised product text.
//!
//! Two strategies implement [`ExtractionStrategy`]: a linguistic extractor
//! (lemmatisation, a large stopword lexicon and token-shape filters) and a
//! lexical fallback (punctuation strip, a small stopword set and a length
//! filter). The strategy is chosen once at construction; per-call behaviour
//! never branches on capability.
//!
//! Ranking is deterministic for both: tokens are ordered by descending
//! occurrence count, ties broken by first occurrence in the text, truncated
//! to `top_n`.

mod lexical;
mod linguistic;

pub use lexical::LexicalExtractor;
pub use linguistic::LinguisticExtractor;

/// Default maximum number of keywords returned per call.
pub const DEFAULT_TOP_N: usize = 15;

/// A deterministic keyword extraction strategy.
pub trait ExtractionStrategy {
    /// Extract at most `top_n` keywords from `text`, ranked by count then
    /// first occurrence.
    fn extract(&self, text: &str, top_n: usize) -> Vec<String>;

    /// Short strategy name for logs.
    fn name(&self) -> &'static str;
}

/// Keyword extractor with a strategy fixed at construction.
///
/// # Examples
///
/// ```
/// use product_lens::KeywordExtractor;
///
/// let extractor = KeywordExtractor::detect();
/// let keywords = extractor.extract("leather strap leather dial");
/// assert_eq!(keywords, ["leather", "strap", "dial"]);
/// ```
pub struct KeywordExtractor {
    strategy: Box<dyn ExtractionStrategy + Send + Sync>,
    top_n: usize,
}

impl KeywordExtractor {
    /// Probe for the richest available strategy.
    ///
    /// The linguistic lexicon is compiled into the binary, so the probe
    /// currently always selects it; the fallback path stays reachable
    /// through [`Self::lexical`] for parity with deployments that lack the
    /// linguistic resources.
    #[must_use]
    pub fn detect() -> Self {
        if LinguisticExtractor::available() {
            Self::linguistic()
        } else {
            Self::lexical()
        }
    }

    /// Extractor backed by the linguistic strategy.
    #[must_use]
    pub fn linguistic() -> Self {
        Self {
            strategy: Box::new(LinguisticExtractor::new()),
            top_n: DEFAULT_TOP_N,
        }
    }

    /// Extractor backed by the lexical fallback strategy.
    #[must_use]
    pub fn lexical() -> Self {
        Self {
            strategy: Box::new(LexicalExtractor::new()),
            top_n: DEFAULT_TOP_N,
        }
    }

    /// Override the maximum number of keywords returned.
    #[must_use]
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Extract keywords from `text` using the configured strategy and limit.
    #[must_use]
    pub fn extract(&self, text: &str) -> Vec<String> {
        self.extract_top(text, self.top_n)
    }

    /// Extract at most `top_n` keywords, ignoring the configured limit.
    #[must_use]
    pub fn extract_top(&self, text: &str, top_n: usize) -> Vec<String> {
        let keywords = self.strategy.extract(text, top_n);
        tracing::debug!(
            strategy = self.strategy.name(),
            count = keywords.len(),
            "extracted keywords"
        );
        keywords
    }

    /// Name of the active strategy.
    #[must_use]
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::detect()
    }
}

impl std::fmt::Debug for KeywordExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordExtractor")
            .field("strategy", &self.strategy.name())
            .field("top_n", &self.top_n)
            .finish()
    }
}

/// Rank candidate tokens by occurrence count, ties broken by first
/// occurrence, truncated to `top_n`. De-duplicates in the process.
fn rank_by_count(candidates: &[String], top_n: usize) -> Vec<String> {
    let mut counts: Vec<(usize, usize, &str)> = Vec::new();
    for (position, token) in candidates.iter().enumerate() {
        match counts.iter_mut().find(|(_, _, t)| *t == token) {
            Some((count, _, _)) => *count += 1,
            None => counts.push((1, position, token)),
        }
    }
    counts.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    counts
        .into_iter()
        .take(top_n)
        .map(|(_, _, token)| token.to_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn owned(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| (*t).to_owned()).collect()
    }

    #[test]
    fn ranking_prefers_count_then_first_occurrence() {
        let candidates = owned(&["strap", "dial", "strap", "case", "dial", "strap"]);
        assert_eq!(rank_by_count(&candidates, 10), ["strap", "dial", "case"]);
    }

    #[test]
    fn ranking_breaks_ties_by_first_occurrence() {
        let candidates = owned(&["zinc", "amber", "zinc", "amber"]);
        assert_eq!(rank_by_count(&candidates, 10), ["zinc", "amber"]);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 1)]
    #[case(2, 2)]
    #[case(5, 3)]
    fn ranking_respects_top_n(#[case] top_n: usize, #[case] expected: usize) {
        let candidates = owned(&["one", "two", "three"]);
        assert_eq!(rank_by_count(&candidates, top_n).len(), expected);
    }

    #[test]
    fn detect_selects_the_linguistic_strategy() {
        assert_eq!(KeywordExtractor::detect().strategy_name(), "linguistic");
    }

    #[test]
    fn extraction_is_deterministic() {
        let extractor = KeywordExtractor::detect();
        let text = "liter water resistant solid state drive storage case";
        let first = extractor.extract(text);
        assert_eq!(extractor.extract(text), first);
        assert_eq!(
            first,
            [
                "liter", "water", "resistant", "solid", "state", "drive", "storage", "case"
            ]
        );
    }

    #[test]
    fn top_n_bounds_the_result() {
        let extractor = KeywordExtractor::detect().with_top_n(3);
        let keywords = extractor.extract("liter water resistant solid state drive");
        assert_eq!(keywords.len(), 3);
    }
}
