//! Prompt quality heuristic.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Word count at which a prompt is considered good.
pub const GOOD_PROMPT_WORDS: usize = 12;

/// Word count at which a prompt is considered production ready.
pub const PRODUCTION_PROMPT_WORDS: usize = 30;

/// Quality tiers, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PromptTier {
    Missing,
    NeedsDetail,
    Good,
    ProductionReady,
}

impl PromptTier {
    /// Bucket a word count.
    pub fn from_word_count(words: usize) -> Self {
        match words {
            0 => PromptTier::Missing,
            n if n < GOOD_PROMPT_WORDS => PromptTier::NeedsDetail,
            n if n < PRODUCTION_PROMPT_WORDS => PromptTier::Good,
            _ => PromptTier::ProductionReady,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PromptTier::Missing => "Needs a prompt",
            PromptTier::NeedsDetail => "Needs more detail",
            PromptTier::Good => "Good",
            PromptTier::ProductionReady => "Production ready",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            PromptTier::Missing => "Describe the video you want to generate.",
            PromptTier::NeedsDetail => {
                "Add details about the subject, setting, lighting and camera movement."
            }
            PromptTier::Good => "Solid prompt. Style or mood cues can refine it further.",
            PromptTier::ProductionReady => "Detailed prompt, ready for high quality results.",
        }
    }
}

/// Result of assessing a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PromptAssessment {
    pub word_count: usize,
    pub tier: PromptTier,
    pub label: String,
    pub message: String,
}

/// Count whitespace-separated words.
pub fn word_count(prompt: &str) -> usize {
    prompt.split_whitespace().count()
}

/// Assess a prompt's quality from its word count.
pub fn assess(prompt: &str) -> PromptAssessment {
    let words = word_count(prompt);
    let tier = PromptTier::from_word_count(words);
    PromptAssessment {
        word_count: words,
        tier,
        label: tier.label().to_string(),
        message: tier.message().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn test_thresholds() {
        assert_eq!(assess("").tier, PromptTier::Missing);
        assert_eq!(assess("   \n\t ").tier, PromptTier::Missing);
        assert_eq!(assess(&words(1)).tier, PromptTier::NeedsDetail);
        assert_eq!(assess(&words(11)).tier, PromptTier::NeedsDetail);
        assert_eq!(assess(&words(12)).tier, PromptTier::Good);
        assert_eq!(assess(&words(29)).tier, PromptTier::Good);
        assert_eq!(assess(&words(30)).tier, PromptTier::ProductionReady);
        assert_eq!(assess(&words(200)).tier, PromptTier::ProductionReady);
    }

    #[test]
    fn test_tier_is_monotonic_in_word_count() {
        let mut previous = PromptTier::Missing;
        for n in 0..60 {
            let tier = assess(&words(n)).tier;
            assert!(tier >= previous, "tier dropped at {} words", n);
            previous = tier;
        }
    }

    #[test]
    fn test_irregular_whitespace() {
        let a = assess("  a   slow\tdolly \n shot  ");
        assert_eq!(a.word_count, 4);
        assert_eq!(a.label, "Needs more detail");
    }
}
