// src/sentiment.rs
//! Lexicon-based polarity: sum of per-word valence weights with short-range
//! negation.

use once_cell::sync::Lazy;
use std::collections::HashMap;

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).expect("valid sentiment lexicon")
});

/// General-purpose polarity capability used by the relevance scorer.
pub trait PolarityAnalyzer: Send + Sync {
    /// Integer polarity of `text`; positive means favourable wording.
    fn analyze(&self, text: &str) -> i32;
}

#[derive(Debug, Clone, Default)]
pub struct SentimentAnalyzer;

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Lexicon weight for a single lower-cased word (0 when unknown).
    #[inline]
    fn word_score(&self, w: &str) -> i32 {
        *LEXICON.get(w).unwrap_or(&0)
    }

    /// Returns (score, token count).
    /// A negator within the previous 1..=3 tokens flips the sign of a word's
    /// weight.
    pub fn score_text(&self, text: &str) -> (i32, usize) {
        let tokens: Vec<String> = tokenize(text).collect();
        let mut score: i32 = 0;

        for i in 0..tokens.len() {
            let base = self.word_score(tokens[i].as_str());
            if base == 0 {
                continue;
            }
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            score += if negated { -base } else { base };
        }

        (score, tokens.len())
    }
}

impl PolarityAnalyzer for SentimentAnalyzer {
    fn analyze(&self, text: &str) -> i32 {
        self.score_text(text).0
    }
}

/// Alphanumeric tokens, lower-cased.
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

/// Contractions arrive split at the apostrophe ("isn't" -> "isn", "t").
fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "cannot"
            | "without"
            | "isn"
            | "wasn"
            | "aren"
            | "weren"
            | "don"
            | "doesn"
            | "didn"
            | "hasn"
            | "haven"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_word_weights() {
        let a = SentimentAnalyzer::new();
        let (score, n) = a.score_text("A great and hopeful day");
        assert_eq!(score, 3 + 2);
        assert_eq!(n, 5);
    }

    #[test]
    fn negation_flips_sign() {
        let a = SentimentAnalyzer::new();
        assert_eq!(a.analyze("this is not good"), -3);
        assert_eq!(a.analyze("the reef isn't dying"), 3);
    }

    #[test]
    fn unknown_words_are_neutral() {
        let a = SentimentAnalyzer::new();
        assert_eq!(a.analyze("coral reef accelerates after project"), 0);
        assert_eq!(a.analyze(""), 0);
    }
}
