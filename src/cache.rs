// src/cache.rs
//! Article cache and the controller that decides when to hit the network.
//!
//! Request handling:
//! - Empty (or expired) → full aggregation, store, respond (`Miss`).
//! - Populated, no cursor → serve cached, no network (`Hit`).
//! - Populated, cursor → aggregate newer articles; merge + store when any
//!   arrived (`Refresh`), otherwise serve cached untouched (`Hit`).
//!
//! Refreshes are single-flight: callers queue on one lock, and a caller that
//! waited through another caller's attempt takes that attempt's outcome
//! (articles, "nothing new" or the error) instead of fetching again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::models::Article;
use crate::pipeline::{merge, Pipeline};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("news_cache_hits_total", "Reads answered from the cache.");
        describe_counter!(
            "news_cache_refresh_total",
            "Cache writes, labelled full or incremental."
        );
        describe_gauge!("news_cache_articles", "Articles currently cached.");
    });
}

/// How a read was answered; surfaced as the `X-News-Cache` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    Refresh,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
            Self::Refresh => "REFRESH",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    pub articles: Vec<Article>,
    pub last_fetch: DateTime<Utc>,
}

#[derive(Debug)]
struct CacheEntry {
    articles: Vec<Article>,
    last_fetch: DateTime<Utc>,
    stored_at: Instant,
}

/// Single-entry store with whole-entry TTL.
#[derive(Debug)]
pub struct ArticleCache {
    ttl: Duration,
    entry: RwLock<Option<CacheEntry>>,
}

impl ArticleCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: RwLock::new(None),
        }
    }

    /// Current entry, or `None` when empty or expired.
    pub fn snapshot(&self) -> Option<CacheSnapshot> {
        let guard = self.entry.read().unwrap_or_else(|p| p.into_inner());
        guard
            .as_ref()
            .filter(|e| e.stored_at.elapsed() < self.ttl)
            .map(|e| CacheSnapshot {
                articles: e.articles.clone(),
                last_fetch: e.last_fetch,
            })
    }

    pub fn store(&self, articles: Vec<Article>, last_fetch: DateTime<Utc>) {
        let mut guard = self.entry.write().unwrap_or_else(|p| p.into_inner());
        gauge!("news_cache_articles").set(articles.len() as f64);
        *guard = Some(CacheEntry {
            articles,
            last_fetch,
            stored_at: Instant::now(),
        });
    }

    /// Drop the entry. Returns how many articles it held (0 if expired).
    pub fn clear(&self) -> usize {
        let mut guard = self.entry.write().unwrap_or_else(|p| p.into_inner());
        let n = guard
            .take()
            .filter(|e| e.stored_at.elapsed() < self.ttl)
            .map(|e| e.articles.len())
            .unwrap_or(0);
        gauge!("news_cache_articles").set(0.0);
        n
    }
}

/// Outcome of the most recent refresh attempt, kept for callers that
/// queued behind it.
#[derive(Debug, Default)]
struct LastFlight {
    seq: u64,
    /// Cursor the attempt ran with; `None` for a full aggregation.
    cursor: Option<DateTime<Utc>>,
    error: Option<String>,
}

impl LastFlight {
    /// Whether this attempt fetched everything `want` asks for.
    fn covers(&self, want: Option<DateTime<Utc>>) -> bool {
        match (self.cursor, want) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(done), Some(want)) => done <= want,
        }
    }
}

/// Owns the cache and the pipeline; the only writer of the cache.
pub struct NewsController {
    cache: ArticleCache,
    pipeline: Pipeline,
    flight: tokio::sync::Mutex<LastFlight>,
    finished: AtomicU64,
}

impl NewsController {
    pub fn new(cache: ArticleCache, pipeline: Pipeline) -> Self {
        ensure_metrics_described();
        Self {
            cache,
            pipeline,
            flight: tokio::sync::Mutex::new(LastFlight::default()),
            finished: AtomicU64::new(0),
        }
    }

    pub fn cache(&self) -> &ArticleCache {
        &self.cache
    }

    pub fn sources(&self) -> &[SourceConfig] {
        self.pipeline.sources()
    }

    pub fn clear(&self) -> usize {
        let n = self.cache.clear();
        info!(target: "cache", cleared = n, "cache cleared");
        n
    }

    /// Serve articles, refreshing only when the entry is missing or a cursor
    /// asks for newer items. A failed refresh leaves the cache as it was.
    pub async fn read(&self, since: Option<DateTime<Utc>>) -> Result<(Vec<Article>, CacheStatus)> {
        let observed = self.finished.load(Ordering::Acquire);
        if let (Some(snap), None) = (self.cache.snapshot(), since) {
            counter!("news_cache_hits_total").increment(1);
            return Ok((snap.articles, CacheStatus::Hit));
        }

        let mut flight = self.flight.lock().await;

        // an attempt finished while we waited; its outcome answers us too
        if flight.seq > observed && flight.covers(since) {
            if let Some(msg) = &flight.error {
                debug!(target: "cache", "shared failed refresh with queued caller");
                return Err(anyhow!("{msg}"));
            }
            if let Some(snap) = self.cache.snapshot() {
                debug!(target: "cache", "shared refresh with queued caller");
                counter!("news_cache_hits_total").increment(1);
                return Ok((snap.articles, CacheStatus::Hit));
            }
        }

        let snapshot = self.cache.snapshot();
        let cursor = snapshot.as_ref().and(since);
        let outcome = self.refresh(snapshot, since).await;

        *flight = LastFlight {
            seq: self.finished.fetch_add(1, Ordering::AcqRel) + 1,
            cursor,
            error: outcome.as_ref().err().map(|e| format!("{e:#}")),
        };
        outcome
    }

    /// Runs with the flight lock held.
    async fn refresh(
        &self,
        snapshot: Option<CacheSnapshot>,
        since: Option<DateTime<Utc>>,
    ) -> Result<(Vec<Article>, CacheStatus)> {
        match (snapshot, since) {
            (None, _) => {
                let report = self.pipeline.aggregate(None).await?;
                let articles = report.articles;
                self.cache.store(articles.clone(), Utc::now());
                counter!("news_cache_refresh_total", "kind" => "full").increment(1);
                info!(target: "cache", count = articles.len(), "cache populated");
                Ok((articles, CacheStatus::Miss))
            }
            (Some(snap), None) => {
                counter!("news_cache_hits_total").increment(1);
                Ok((snap.articles, CacheStatus::Hit))
            }
            (Some(snap), Some(cursor)) => {
                let report = self.pipeline.aggregate(Some(cursor)).await?;
                if report.articles.is_empty() {
                    debug!(target: "cache", since = %cursor, "no newer articles");
                    counter!("news_cache_hits_total").increment(1);
                    return Ok((snap.articles, CacheStatus::Hit));
                }
                let added = report.articles.len();
                let merged = merge(
                    report.today,
                    report.articles,
                    snap.articles,
                    self.pipeline.recency_days(),
                );
                self.cache.store(merged.clone(), Utc::now());
                counter!("news_cache_refresh_total", "kind" => "incremental").increment(1);
                info!(target: "cache", added, total = merged.len(), "cache merged");
                Ok((merged, CacheStatus::Refresh))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn art(title: &str) -> Article {
        Article {
            title: title.into(),
            link: format!("https://x.test/{title}"),
            source: "S".into(),
            impact: 1.0,
            themes: vec!["hope".into()],
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        }
    }

    #[test]
    fn store_snapshot_clear() {
        let c = ArticleCache::new(Duration::from_secs(60));
        assert!(c.snapshot().is_none());

        let t = Utc::now();
        c.store(vec![art("a"), art("b")], t);
        let s = c.snapshot().unwrap();
        assert_eq!(s.articles.len(), 2);
        assert_eq!(s.last_fetch, t);

        assert_eq!(c.clear(), 2);
        assert!(c.snapshot().is_none());
        assert_eq!(c.clear(), 0);
    }

    #[test]
    fn entry_expires_after_ttl() {
        let c = ArticleCache::new(Duration::from_millis(20));
        c.store(vec![art("a")], Utc::now());
        assert!(c.snapshot().is_some());
        std::thread::sleep(Duration::from_millis(40));
        assert!(c.snapshot().is_none());
    }

    #[test]
    fn last_flight_covers_same_or_later_cursors() {
        let t = Utc::now();
        let full = LastFlight::default();
        assert!(full.covers(None));
        assert!(full.covers(Some(t)));

        let inc = LastFlight {
            seq: 1,
            cursor: Some(t),
            error: None,
        };
        assert!(inc.covers(Some(t)));
        assert!(inc.covers(Some(t + chrono::Duration::hours(1))));
        assert!(!inc.covers(Some(t - chrono::Duration::hours(1))));
        assert!(!inc.covers(None));
    }

    #[test]
    fn status_labels() {
        assert_eq!(CacheStatus::Hit.as_str(), "HIT");
        assert_eq!(CacheStatus::Miss.as_str(), "MISS");
        assert_eq!(CacheStatus::Refresh.as_str(), "REFRESH");
    }
}
