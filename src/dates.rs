// src/dates.rs
//! Publish-date resolution for one entry of a scraped page.
//!
//! Resolution is an ordered list of strategies, each returning `Option`;
//! the first hit wins and the current date is the final fallback. Every
//! candidate string goes through [`parse_date_text`], which never fails
//! loudly: anything unparseable is simply "not found".
//!
//! Order:
//! 1. per-source selector hint (closest entry container, then ancestors)
//! 2. `<time>` elements in the same containers
//! 3. document `<meta>` tags whose name/property mentions time or date
//! 4. well-known date class names inside the entry container
//! 5. labelled text such as "Published: 3 March 2024"
//! 6. relative text ("3 days ago", "yesterday")
//! 7. today

use chrono::{Datelike, Days, Months, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;
use tracing::debug;

/// Ancestors searched above the entry container.
const MAX_ANCESTOR_HOPS: usize = 3;

/// Class-name fragments that mark an element as an entry container.
const CONTAINER_HINTS: &[&str] = &["article", "post", "story", "card", "entry", "teaser", "item"];

/// Explicit formats tried before the free-form scan, most specific first.
const EXPLICIT_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%b. %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%A, %B %d, %Y",
    "%A %d %B %Y",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%Y%m%d",
];

static SEL_TIME: Lazy<Selector> = Lazy::new(|| Selector::parse("time").expect("time selector"));
static SEL_META: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta[content]").expect("meta selector"));
static SEL_DATE_CLASSES: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        ".date",
        ".published",
        ".post-date",
        ".entry-date",
        ".timestamp",
        ".article-date",
        "[itemprop=\"datePublished\"]",
    ]
    .iter()
    .map(|s| Selector::parse(s).expect("date class selector"))
    .collect()
});

static RE_LABEL_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:published|posted|date|updated|last updated)\b\s*(?:on\b)?\s*:?\s*")
        .expect("label regex")
});
static RE_LABELLED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:published|posted|date|updated)\s*(?:on)?\s*:\s*([^\n|]{6,60})")
        .expect("labelled regex")
});
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));
static RE_ISO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})[-/](\d{1,2})[-/](\d{1,2})\b").expect("iso regex"));
static RE_MONTH_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b")
        .expect("month-first regex")
});
static RE_DAY_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?,?\s+(\d{4})\b")
        .expect("day-first regex")
});
static RE_NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})[/.](\d{1,2})[/.](\d{4})\b").expect("numeric regex"));
static RE_EPOCH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{10}(?:\d{3})?$").expect("epoch regex"));
static RE_RELATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d+|an?|one)\s+(minute|hour|day|week|month)s?\s+ago\b")
        .expect("relative regex")
});
static RE_YESTERDAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\byesterday\b").expect("yesterday regex"));

/// Inputs shared by all strategies.
pub struct DateProbe<'a> {
    pub document: &'a Html,
    pub fragment: ElementRef<'a>,
    pub hint: Option<&'a str>,
    pub today: NaiveDate,
}

type Strategy = fn(&DateProbe<'_>) -> Option<NaiveDate>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("source_hint", by_source_hint),
    ("time_element", by_time_element),
    ("meta_tag", by_meta_tag),
    ("date_class", by_date_class),
    ("labelled_text", by_labelled_text),
    ("relative_text", by_relative_text),
];

/// Resolve the publish date of the entry around `fragment`. Always returns a
/// date; `today` when nothing usable is found.
pub fn resolve_date(
    document: &Html,
    fragment: ElementRef<'_>,
    hint: Option<&str>,
    today: NaiveDate,
) -> NaiveDate {
    resolve_with_strategy(document, fragment, hint, today).0
}

/// Same as [`resolve_date`], also naming the strategy that produced it.
pub fn resolve_with_strategy(
    document: &Html,
    fragment: ElementRef<'_>,
    hint: Option<&str>,
    today: NaiveDate,
) -> (NaiveDate, &'static str) {
    let probe = DateProbe {
        document,
        fragment,
        hint,
        today,
    };
    for &(name, strategy) in STRATEGIES {
        if let Some(d) = strategy(&probe) {
            debug!(target: "pipeline", strategy = name, date = %d, "date resolved");
            return (d, name);
        }
    }
    (today, "default_today")
}

/* ----------------------------
Search scopes
---------------------------- */

fn is_entry_container(el: &ElementRef<'_>) -> bool {
    let v = el.value();
    if v.name() == "article" {
        return true;
    }
    v.classes().any(|c| {
        let c = c.to_ascii_lowercase();
        CONTAINER_HINTS.iter().any(|h| c.contains(h))
    })
}

fn is_document_root(el: &ElementRef<'_>) -> bool {
    matches!(el.value().name(), "body" | "html" | "main")
}

/// Closest entry container (the fragment itself counts), or the fragment.
fn entry_container<'a>(fragment: ElementRef<'a>) -> ElementRef<'a> {
    if is_entry_container(&fragment) {
        return fragment;
    }
    fragment
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take_while(|el| !is_document_root(el))
        .find(is_entry_container)
        .unwrap_or(fragment)
}

/// Entry container followed by a few of its ancestors.
fn search_scopes<'a>(fragment: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    let primary = entry_container(fragment);
    let mut scopes = vec![primary];
    scopes.extend(
        primary
            .ancestors()
            .filter_map(ElementRef::wrap)
            .take_while(|el| !is_document_root(el))
            .take(MAX_ANCESTOR_HOPS),
    );
    scopes
}

fn element_text(el: &ElementRef<'_>) -> String {
    let joined = el.text().collect::<Vec<_>>().join(" ");
    RE_WS.replace_all(&joined, " ").trim().to_string()
}

/// Attribute values first (machine-readable), then visible text.
fn date_from_element(el: &ElementRef<'_>) -> Option<NaiveDate> {
    for attr in ["datetime", "content", "data-date", "data-timestamp", "title"] {
        if let Some(d) = el.value().attr(attr).and_then(parse_date_text) {
            return Some(d);
        }
    }
    parse_date_text(&element_text(el))
}

fn first_in_scopes(scopes: &[ElementRef<'_>], sel: &Selector) -> Option<NaiveDate> {
    scopes
        .iter()
        .flat_map(|scope| scope.select(sel))
        .find_map(|el| date_from_element(&el))
}

/* ----------------------------
Strategies
---------------------------- */

fn by_source_hint(p: &DateProbe<'_>) -> Option<NaiveDate> {
    let sel = Selector::parse(p.hint?).ok()?;
    first_in_scopes(&search_scopes(p.fragment), &sel)
}

fn by_time_element(p: &DateProbe<'_>) -> Option<NaiveDate> {
    first_in_scopes(&search_scopes(p.fragment), &SEL_TIME)
}

fn by_meta_tag(p: &DateProbe<'_>) -> Option<NaiveDate> {
    let mut published = Vec::new();
    let mut other = Vec::new();
    for meta in p.document.select(&SEL_META) {
        let v = meta.value();
        let key = v
            .attr("property")
            .or_else(|| v.attr("name"))
            .or_else(|| v.attr("itemprop"))
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !(key.contains("time") || key.contains("date")) {
            continue;
        }
        let Some(content) = v.attr("content") else {
            continue;
        };
        if key.contains("publish") {
            published.push(content);
        } else {
            other.push(content);
        }
    }
    published.into_iter().chain(other).find_map(parse_date_text)
}

fn by_date_class(p: &DateProbe<'_>) -> Option<NaiveDate> {
    let container = entry_container(p.fragment);
    SEL_DATE_CLASSES
        .iter()
        .flat_map(|sel| container.select(sel))
        .find_map(|el| date_from_element(&el))
}

fn by_labelled_text(p: &DateProbe<'_>) -> Option<NaiveDate> {
    let text = element_text(&entry_container(p.fragment));
    RE_LABELLED
        .captures_iter(&text)
        .filter_map(|c| c.get(1))
        .find_map(|m| parse_date_text(m.as_str()))
}

fn by_relative_text(p: &DateProbe<'_>) -> Option<NaiveDate> {
    let text = element_text(&entry_container(p.fragment));
    parse_relative(&text, p.today)
}

/* ----------------------------
Parsing
---------------------------- */

/// Parse a date out of free text. Strips leading labels, then tries
/// RFC 3339, RFC 2822, the explicit format list, and finally scans for a
/// recognisable date anywhere in the string.
pub fn parse_date_text(raw: &str) -> Option<NaiveDate> {
    let collapsed = RE_WS.replace_all(raw, " ");
    let cleaned = RE_LABEL_PREFIX.replace(collapsed.trim(), "");
    let s = cleaned.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
        return from_time_date(dt.date());
    }
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822) {
        return from_time_date(dt.date());
    }
    if RE_EPOCH.is_match(s) {
        return parse_epoch(s);
    }
    for fmt in EXPLICIT_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return plausible(d);
        }
    }
    parse_free_form(s)
}

fn from_time_date(d: time::Date) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(d.year(), u8::from(d.month()) as u32, d.day() as u32)
        .and_then(plausible)
}

fn parse_epoch(s: &str) -> Option<NaiveDate> {
    let mut secs: i64 = s.parse().ok()?;
    if s.len() == 13 {
        secs /= 1000;
    }
    chrono::DateTime::from_timestamp(secs, 0).and_then(|dt| plausible(dt.date_naive()))
}

/// Rejects years that cannot be a news publish date (parsers happily accept
/// "0001" or "9999").
fn plausible(d: NaiveDate) -> Option<NaiveDate> {
    let max_year = chrono::Utc::now().year() + 1;
    (1990..=max_year).contains(&d.year()).then_some(d)
}

fn month_number(name: &str) -> Option<u32> {
    let m = match name.get(..3)?.to_ascii_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(m)
}

fn ymd(y: &str, m: u32, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m, d.parse().ok()?).and_then(plausible)
}

/// Finds the first recognisable date embedded in longer text.
fn parse_free_form(s: &str) -> Option<NaiveDate> {
    if let Some(c) = RE_ISO.captures(s) {
        if let Some(d) = ymd(&c[1], c[2].parse().ok()?, &c[3]) {
            return Some(d);
        }
    }
    if let Some(c) = RE_MONTH_FIRST.captures(s) {
        if let Some(d) = month_number(&c[1]).and_then(|m| ymd(&c[3], m, &c[2])) {
            return Some(d);
        }
    }
    if let Some(c) = RE_DAY_FIRST.captures(s) {
        if let Some(d) = month_number(&c[2]).and_then(|m| ymd(&c[3], m, &c[1])) {
            return Some(d);
        }
    }
    if let Some(c) = RE_NUMERIC.captures(s) {
        // day-first, then month-first
        let a: u32 = c[1].parse().ok()?;
        let b: u32 = c[2].parse().ok()?;
        return ymd(&c[3], b, &c[1]).or_else(|| ymd(&c[3], a, &c[2]));
    }
    None
}

/// "N minutes/hours/days/weeks/months ago" or "yesterday", relative to `today`.
pub fn parse_relative(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    if let Some(c) = RE_RELATIVE.captures(text) {
        let n: u64 = match c[1].to_ascii_lowercase().as_str() {
            "a" | "an" | "one" => 1,
            digits => digits.parse().ok()?,
        };
        return match c[2].to_ascii_lowercase().as_str() {
            "minute" | "hour" => today.checked_sub_days(Days::new(hours_to_days(&c[2], n))),
            "day" => today.checked_sub_days(Days::new(n)),
            "week" => n.checked_mul(7).and_then(|d| today.checked_sub_days(Days::new(d))),
            "month" => u32::try_from(n)
                .ok()
                .and_then(|m| today.checked_sub_months(Months::new(m))),
            _ => None,
        };
    }
    if RE_YESTERDAY.is_match(text) {
        return today.checked_sub_days(Days::new(1));
    }
    None
}

/// Whole days covered by `n` minutes or hours.
fn hours_to_days(unit: &str, n: u64) -> u64 {
    if unit.eq_ignore_ascii_case("hour") {
        n / 24
    } else {
        n / (24 * 60)
    }
}
