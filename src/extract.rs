// src/extract.rs
//! Candidate discovery and Article construction for one fetched page.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::config::SourceConfig;
use crate::dates::resolve_date;
use crate::models::{Article, RawCandidate};
use crate::relevance::{ImpactScorer, MIN_TITLE_CHARS};

/// Summary text passed to the scorer is capped at this many chars.
const SUMMARY_MAX_CHARS: usize = 300;

const TITLE_HINTS: &[&str] = &["entry-title", "article-title", "post-title"];

static SEL_CONTAINERS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"article, [role="article"], [itemtype*="Article"]"#)
        .expect("container selector")
});
static SEL_STYLED_HEADINGS: Lazy<Selector> = Lazy::new(|| {
    let list = (1..=6)
        .flat_map(|n| {
            TITLE_HINTS
                .iter()
                .map(move |hint| format!(r#"h{n}[class*="{hint}"]"#))
        })
        .collect::<Vec<_>>()
        .join(", ");
    Selector::parse(&list).expect("styled heading selector")
});
static SEL_HEADINGS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").expect("heading selector"));
static SEL_LINKS: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("link selector"));
static SEL_IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("img selector"));
static SEL_PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("p selector"));

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));
static RE_BYLINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:By|From)\s+[A-Z][\w'’.\-]*\s+[A-Z][\w'’.\-]*\s*[:|,\-–]?\s*")
        .expect("byline regex")
});

/// Extract scored, dated articles from one source page.
pub fn extract_articles(
    source: &SourceConfig,
    html: &str,
    scorer: &dyn ImpactScorer,
    today: NaiveDate,
) -> Vec<Article> {
    let document = Html::parse_document(html);
    let candidates = collect_candidates(&document);
    let total = candidates.len();

    let articles: Vec<Article> = candidates
        .into_iter()
        .filter_map(|c| build_article(&document, c, source, scorer, today))
        .collect();

    debug!(
        target: "pipeline",
        source = %source.name,
        candidates = total,
        kept = articles.len(),
        "extracted page"
    );
    articles
}

/// Semantic article containers when the page has them, otherwise every link.
pub fn collect_candidates(document: &Html) -> Vec<RawCandidate<'_>> {
    let containers: Vec<ElementRef<'_>> = document.select(&SEL_CONTAINERS).collect();
    if containers.is_empty() {
        return document
            .select(&SEL_LINKS)
            .map(|a| RawCandidate {
                title: element_text(&a),
                href: a.value().attr("href").map(str::to_string),
                fragment: a,
                summary: None,
            })
            .collect();
    }

    containers
        .into_iter()
        .filter_map(|container| {
            let title_el = select_title(&container)?;
            let href = if title_el.value().name() == "a" {
                title_el.value().attr("href").map(str::to_string)
            } else {
                // a link inside the heading beats the container's first link
                title_el
                    .select(&SEL_LINKS)
                    .next()
                    .or_else(|| container.select(&SEL_LINKS).next())
                    .and_then(|a| a.value().attr("href"))
                    .map(str::to_string)
            };
            let title = element_text(&title_el);
            let summary = select_summary(&container, &title);
            Some(RawCandidate {
                title,
                href,
                fragment: container,
                summary,
            })
        })
        .collect()
}

/// Styled heading → first heading without an image → first long link
/// without an image.
fn select_title<'a>(container: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    if let Some(h) = container
        .select(&SEL_STYLED_HEADINGS)
        .find(|h| !element_text(h).is_empty())
    {
        return Some(h);
    }
    if let Some(h) = container
        .select(&SEL_HEADINGS)
        .find(|h| !has_image(h) && !element_text(h).is_empty())
    {
        return Some(h);
    }
    container
        .select(&SEL_LINKS)
        .find(|a| !has_image(a) && normalize_title(&element_text(a)).chars().count() > MIN_TITLE_CHARS)
}

fn select_summary(container: &ElementRef<'_>, title: &str) -> Option<String> {
    container
        .select(&SEL_PARAGRAPH)
        .map(|p| element_text(&p))
        .find(|t| !t.is_empty() && t != title)
        .map(|t| t.chars().take(SUMMARY_MAX_CHARS).collect())
}

fn has_image(el: &ElementRef<'_>) -> bool {
    el.select(&SEL_IMG).next().is_some()
}

fn element_text(el: &ElementRef<'_>) -> String {
    let joined = el.text().collect::<Vec<_>>().join(" ");
    RE_WS.replace_all(&joined, " ").trim().to_string()
}

/// Validate one candidate and turn it into an `Article`.
fn build_article(
    document: &Html,
    candidate: RawCandidate<'_>,
    source: &SourceConfig,
    scorer: &dyn ImpactScorer,
    today: NaiveDate,
) -> Option<Article> {
    let href = candidate.href.as_deref().map(str::trim).filter(|h| is_followable(h))?;

    let title = normalize_title(&candidate.title);
    if title.chars().count() <= MIN_TITLE_CHARS {
        return None;
    }

    let link = resolve_link(&source.base_url, href)?;

    let rel = scorer.score(&title, candidate.summary.as_deref());
    if !rel.is_relevant {
        return None;
    }

    let date = resolve_date(
        document,
        candidate.fragment,
        source.date_selector.as_deref(),
        today,
    );

    Some(Article {
        title,
        link,
        source: source.name.clone(),
        impact: rel.score,
        themes: rel.themes,
        date,
    })
}

fn is_followable(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    !(href.is_empty()
        || href.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:"))
}

/// Decode stray entities, collapse whitespace, drop a leading "By First Last"
/// or "From First Last" byline, trim.
pub fn normalize_title(raw: &str) -> String {
    let decoded = html_escape::decode_html_entities(raw);
    let collapsed = RE_WS.replace_all(&decoded, " ");
    let trimmed = collapsed.trim();
    RE_BYLINE.replace(trimmed, "").trim().to_string()
}

/// Absolute links pass through; relative ones are resolved against `base`.
pub fn resolve_link(base: &str, href: &str) -> Option<String> {
    let lower = href.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Some(href.to_string());
    }
    match Url::parse(base) {
        Ok(b) => b.join(href).ok().map(|u| u.to_string()),
        Err(_) => {
            let base = base.trim_end_matches('/');
            if href.starts_with('/') {
                Some(format!("{base}{href}"))
            } else {
                Some(format!("{base}/{href}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relevance::{RelevanceScorer, ScoringMode};
    use crate::taxonomy::{Taxonomy, TaxonomyHandle};

    fn src() -> SourceConfig {
        SourceConfig::new("Example", "https://example.test/env", "https://example.test")
    }

    fn scorer() -> RelevanceScorer {
        RelevanceScorer::new(TaxonomyHandle::new(Taxonomy::builtin()), ScoringMode::Composite)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    #[test]
    fn coral_reef_article_is_extracted() {
        let html = r#"<html><body>
            <article>
              <h2 class="entry-title">Coral Reef Recovery Accelerates After Restoration Project</h2>
              <a href="/story1">Read more</a>
              <time datetime="2024-03-01">March 1</time>
            </article>
        </body></html>"#;
        let out = extract_articles(&src(), html, &scorer(), today());
        assert_eq!(out.len(), 1);
        let a = &out[0];
        assert_eq!(a.title, "Coral Reef Recovery Accelerates After Restoration Project");
        assert_eq!(a.link, "https://example.test/story1");
        assert_eq!(a.source, "Example");
        assert_eq!(a.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert!(a.impact > 0.0);
        assert!(a.themes.contains(&"recovery".to_string()));
        assert!(a.themes.contains(&"conservation".to_string()));
    }

    #[test]
    fn election_story_is_rejected() {
        let html = r#"<article>
              <h2 class="entry-title">Local Election Results Announced Today For New Council</h2>
              <a href="/story2">Read more</a>
              <time datetime="2024-03-01">March 1</time>
            </article>"#;
        assert!(extract_articles(&src(), html, &scorer(), today()).is_empty());
    }

    #[test]
    fn title_priority_prefers_styled_heading_then_plain_heading() {
        let html = r#"<article>
              <h3><img src="x.png"> Photo heading</h3>
              <h4>Community volunteers restore coastal wetlands together</h4>
              <h2 class="post-title">Solar microgrid brings hope to island community</h2>
              <a href="/a">x</a>
            </article>"#;
        let doc = Html::parse_document(html);
        let c = collect_candidates(&doc);
        assert_eq!(c.len(), 1);
        assert_eq!(
            normalize_title(&c[0].title),
            "Solar microgrid brings hope to island community"
        );

        let html = html.replace(r#" class="post-title""#, "");
        let doc = Html::parse_document(&html);
        let c = collect_candidates(&doc);
        assert_eq!(
            normalize_title(&c[0].title),
            "Community volunteers restore coastal wetlands together"
        );
    }

    #[test]
    fn link_title_uses_its_own_href() {
        let html = r#"<article>
              <a href="/img"><img src="a.png"></a>
              <a href="/story">Rewilding project sees beavers thriving again</a>
            </article>"#;
        let doc = Html::parse_document(html);
        let c = collect_candidates(&doc);
        assert_eq!(c[0].href.as_deref(), Some("/story"));
    }

    #[test]
    fn heading_title_uses_link_inside_heading() {
        let html = r#"<article>
              <a href="/img"><img src="a.png"></a>
              <h2><a href="/story">Rewilding project sees beavers thriving again</a></h2>
            </article>"#;
        let doc = Html::parse_document(html);
        let c = collect_candidates(&doc);
        assert_eq!(c[0].href.as_deref(), Some("/story"));
    }

    #[test]
    fn falls_back_to_all_links_without_containers() {
        let html = r#"<ul>
              <li><a href="/about">About us</a></li>
              <li><a href="https://other.test/x">Community solar initiative powers rural school</a></li>
              <li><a href="javascript:void(0)">Community solar initiative powers rural school</a></li>
            </ul>"#;
        let out = extract_articles(&src(), html, &scorer(), today());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].link, "https://other.test/x");
        assert_eq!(out[0].date, today());
    }

    #[test]
    fn missing_link_or_short_title_is_skipped() {
        let html = r#"<article><h2>Community solar initiative powers rural school</h2></article>
            <article><h2>Reef news</h2><a href="/r">go</a></article>"#;
        assert!(extract_articles(&src(), html, &scorer(), today()).is_empty());
    }

    #[test]
    fn summary_feeds_the_scorer() {
        let html = r#"<article>
              <h2>New project brings families to the coast this summer</h2>
              <p>Volunteers planted mangroves together along the bay.</p>
              <a href="/m">more</a>
            </article>"#;
        let out = extract_articles(&src(), html, &scorer(), today());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].themes, vec!["community"]);
    }

    #[test]
    fn normalize_title_collapses_and_strips_byline() {
        assert_eq!(
            normalize_title("  By Jane Doe   Sea turtles\n\n return to   nesting beach "),
            "Sea turtles return to nesting beach"
        );
        assert_eq!(normalize_title("From Staff Reports: Wetland saved"), "Wetland saved");
        assert_eq!(normalize_title("Solar &amp; wind records"), "Solar & wind records");
        assert_eq!(normalize_title("Bycatch cut in half"), "Bycatch cut in half");
    }

    #[test]
    fn resolve_link_handles_relative_and_absolute() {
        let base = "https://example.test";
        assert_eq!(resolve_link(base, "/a/b").as_deref(), Some("https://example.test/a/b"));
        assert_eq!(resolve_link(base, "a/b").as_deref(), Some("https://example.test/a/b"));
        assert_eq!(
            resolve_link(base, "https://cdn.test/x").as_deref(),
            Some("https://cdn.test/x")
        );
        assert_eq!(
            resolve_link(base, "//cdn.test/x").as_deref(),
            Some("https://cdn.test/x")
        );
        assert_eq!(resolve_link("not a base", "x").as_deref(), Some("not a base/x"));
    }
}
