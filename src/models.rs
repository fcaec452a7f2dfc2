// src/models.rs
//! Records that flow through the pipeline: transient candidates and the
//! published `Article`.

use chrono::NaiveDate;
use scraper::ElementRef;
use serde::{Deserialize, Serialize};

/// A scored, dated news entry. The `(title, link)` pair is its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub link: String,
    pub source: String,
    /// Impact score; serialized as `sentiment` for UI compatibility.
    #[serde(rename = "sentiment")]
    pub impact: f32,
    pub themes: Vec<String>,
    /// Publish date, serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
}

impl Article {
    /// Deduplication key: case-insensitive `(title, link)`.
    pub fn identity(&self) -> (String, String) {
        (self.title.to_lowercase(), self.link.to_lowercase())
    }
}

/// One candidate entry found in a document, before any validation.
#[derive(Debug, Clone)]
pub struct RawCandidate<'a> {
    pub title: String,
    pub href: Option<String>,
    /// Fragment used for date lookup (the container or the anchor itself).
    pub fragment: ElementRef<'a>,
    /// Optional teaser text found next to the title.
    pub summary: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_ui_field_names() {
        let a = Article {
            title: "Coral reefs rebound across the Pacific".into(),
            link: "https://example.test/a".into(),
            source: "Example".into(),
            impact: 4.0,
            themes: vec!["recovery".into()],
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        };
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v["sentiment"], 4.0);
        assert_eq!(v["date"], "2024-03-01");
        assert!(v.get("impact").is_none());
    }

    #[test]
    fn identity_ignores_case() {
        let mk = |t: &str, l: &str| Article {
            title: t.into(),
            link: l.into(),
            source: "S".into(),
            impact: 1.0,
            themes: vec![],
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        assert_eq!(
            mk("Solar Farm Opens", "https://x.test/A").identity(),
            mk("solar farm opens", "https://x.test/a").identity()
        );
    }
}
