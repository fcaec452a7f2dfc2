// src/relevance.rs
//! Relevance gate: exclusion → domain check → theme hits → polarity, combined
//! according to the configured scoring mode.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::info;

use crate::sentiment::{PolarityAnalyzer, SentimentAnalyzer};
use crate::taxonomy::TaxonomyHandle;

/// Titles at or below this many chars are navigation chrome, not stories.
pub const MIN_TITLE_CHARS: usize = 20;

/// Result of relevance evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Relevance {
    pub is_relevant: bool,
    pub score: f32,
    pub themes: Vec<String>,
}

impl Relevance {
    fn rejected() -> Self {
        Self::default()
    }
}

/// How theme hits and polarity are folded into the impact score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoringMode {
    /// `theme_hits * 2 + polarity`; relevant iff a theme matched and score > 0.
    #[default]
    Composite,
    /// `clamp((polarity + 5) / 10 * 100, 0, 100)`; relevant iff polarity > 0,
    /// a theme matched and the title is longer than 20 chars.
    Normalized,
}

impl FromStr for ScoringMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "composite" => Ok(Self::Composite),
            "normalized" | "normalised" => Ok(Self::Normalized),
            other => anyhow::bail!("unknown scoring mode `{other}`"),
        }
    }
}

impl fmt::Display for ScoringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Composite => f.write_str("composite"),
            Self::Normalized => f.write_str("normalized"),
        }
    }
}

/// Scoring seam used by the extractor.
pub trait ImpactScorer: Send + Sync {
    fn score(&self, title: &str, body: Option<&str>) -> Relevance;
}

/// Taxonomy + polarity scorer.
#[derive(Clone)]
pub struct RelevanceScorer {
    taxonomy: TaxonomyHandle,
    analyzer: Arc<dyn PolarityAnalyzer>,
    mode: ScoringMode,
}

impl RelevanceScorer {
    pub fn new(taxonomy: TaxonomyHandle, mode: ScoringMode) -> Self {
        Self::with_analyzer(taxonomy, Arc::new(SentimentAnalyzer::new()), mode)
    }

    pub fn with_analyzer(
        taxonomy: TaxonomyHandle,
        analyzer: Arc<dyn PolarityAnalyzer>,
        mode: ScoringMode,
    ) -> Self {
        Self {
            taxonomy,
            analyzer,
            mode,
        }
    }

    pub fn mode(&self) -> ScoringMode {
        self.mode
    }
}

impl ImpactScorer for RelevanceScorer {
    fn score(&self, title: &str, body: Option<&str>) -> Relevance {
        let text = match body {
            Some(b) if !b.is_empty() => format!("{} {}", title, b).to_lowercase(),
            _ => title.to_lowercase(),
        };

        let gate = self.taxonomy.with(|tax| {
            if let Some(kw) = tax.excluded_by(&text) {
                return Err(format!("exclude:{kw}"));
            }
            if !tax.is_in_domain(&text) {
                return Err("out_of_domain".to_string());
            }
            let hits = tax.theme_hits(&text);
            let theme_score: usize = hits.iter().map(|(_, n)| n).sum();
            let themes: Vec<String> = hits.into_iter().map(|(l, _)| l.to_string()).collect();
            Ok((themes, theme_score))
        });

        let (themes, theme_score) = match gate {
            Ok(v) => v,
            Err(reason) => {
                dev_log_relevance("rejected", title, &[], &reason, 0.0);
                return Relevance::rejected();
            }
        };

        let polarity = self.analyzer.analyze(&text);
        let rel = match self.mode {
            ScoringMode::Composite => {
                let score = (theme_score as i64 * 2 + polarity as i64) as f32;
                Relevance {
                    is_relevant: !themes.is_empty() && score > 0.0,
                    score,
                    themes,
                }
            }
            ScoringMode::Normalized => {
                let score = normalized_score(polarity);
                let long_enough = title.trim().chars().count() > MIN_TITLE_CHARS;
                Relevance {
                    is_relevant: polarity > 0 && !themes.is_empty() && long_enough,
                    score,
                    themes,
                }
            }
        };

        let event = if rel.is_relevant { "passed" } else { "neutralized" };
        dev_log_relevance(event, title, &rel.themes, &self.mode.to_string(), rel.score);
        rel
    }
}

/// Map polarity onto 0..=100, with 0 polarity landing on 50.
pub fn normalized_score(polarity: i32) -> f32 {
    (((polarity as f32 + 5.0) / 10.0) * 100.0).clamp(0.0, 100.0)
}

/* ----------------------------
Dev-only diagnostics
---------------------------- */

// NEWS_DEV_LOG=1 AND dev env (debug build or SHUTTLE_ENV in {local,development,dev})
pub(crate) fn dev_logging_enabled() -> bool {
    let on = std::env::var("NEWS_DEV_LOG").ok().as_deref() == Some("1");
    on && crate::config::is_dev_env()
}

pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Logs a hashed title id plus the matched themes; never the raw title.
fn dev_log_relevance(event: &str, title: &str, themes: &[String], detail: &str, score: f32) {
    if !dev_logging_enabled() {
        return;
    }
    let id = anon_hash(title);
    let themes_short: Vec<&str> = themes.iter().take(5).map(String::as_str).collect();
    info!(target: "relevance", %id, %score, event, detail, themes = ?themes_short);
}
