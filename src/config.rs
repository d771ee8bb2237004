//! Pipeline configuration types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keywords::{DEFAULT_TOP_N, KeywordExtractor};

/// Errors raised when a configuration fails validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `top_n` must allow at least one keyword.
    #[error("top_n must be greater than zero")]
    ZeroTopN,
}

/// Which keyword extraction strategy to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyChoice {
    /// Probe for the richest available strategy.
    #[default]
    Auto,
    /// Force the linguistic strategy.
    Linguistic,
    /// Force the lexical fallback strategy.
    Lexical,
}

/// Keyword extraction settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractionConfig {
    /// Maximum number of keywords per request.
    pub top_n: usize,
    /// Strategy selection.
    pub strategy: StrategyChoice,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            strategy: StrategyChoice::Auto,
        }
    }
}

impl ExtractionConfig {
    /// Check invariants the extractor relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroTopN`] when `top_n` is zero.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.top_n == 0 {
            return Err(ConfigError::ZeroTopN);
        }
        Ok(())
    }

    /// Build the extractor this configuration describes.
    #[must_use]
    pub fn build(&self) -> KeywordExtractor {
        let extractor = match self.strategy {
            StrategyChoice::Auto => KeywordExtractor::detect(),
            StrategyChoice::Linguistic => KeywordExtractor::linguistic(),
            StrategyChoice::Lexical => KeywordExtractor::lexical(),
        };
        extractor.with_top_n(self.top_n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert_eq!(ExtractionConfig::default().validate(), Ok(()));
        assert_eq!(ExtractionConfig::default().top_n, 15);
    }

    #[test]
    fn zero_top_n_is_rejected() {
        let config = ExtractionConfig {
            top_n: 0,
            ..ExtractionConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroTopN));
    }

    #[test]
    #[expect(clippy::expect_used, reason = "test should fail loudly")]
    fn strategy_names_deserialise_lowercase() {
        let config: ExtractionConfig =
            serde_json::from_str(r#"{"top_n": 5, "strategy": "lexical"}"#).expect("deserialise");
        assert_eq!(config.strategy, StrategyChoice::Lexical);
        assert_eq!(config.build().strategy_name(), "lexical");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<ExtractionConfig, _> = serde_json::from_str(r#"{"topn": 5}"#);
        assert!(result.is_err());
    }
}
