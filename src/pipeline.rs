// src/pipeline.rs
//! Aggregation pipeline: fetch every source in parallel, extract, then
//! recency/cursor filter, dedup and sort.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Days, NaiveDate, Utc};
use futures::future::join_all;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::config::SourceConfig;
use crate::extract::extract_articles;
use crate::fetch::PageFetcher;
use crate::models::Article;
use crate::relevance::ImpactScorer;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Aggregation runs started.");
        describe_counter!(
            "pipeline_articles_total",
            "Articles kept after filtering and dedup."
        );
        describe_counter!(
            "pipeline_source_errors_total",
            "Source fetch failures and timeouts."
        );
        describe_counter!("pipeline_dedup_total", "Articles removed as duplicates.");
        describe_counter!(
            "pipeline_stale_total",
            "Articles outside the recency window or not newer than the cursor."
        );
        describe_histogram!("pipeline_source_ms", "Per-source fetch + extract time.");
        describe_gauge!("pipeline_last_run_ts", "Unix ts of the last aggregation run.");
    });
}

/// Outcome of one aggregation run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// UTC date of the run's clock; the recency window is anchored here.
    pub today: NaiveDate,
    pub articles: Vec<Article>,
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub stale: usize,
    pub dedup: usize,
}

pub struct Pipeline {
    sources: Vec<SourceConfig>,
    fetcher: Arc<dyn PageFetcher>,
    scorer: Arc<dyn ImpactScorer>,
    recency_days: i64,
    timeout: Duration,
}

impl Pipeline {
    pub fn new(
        sources: Vec<SourceConfig>,
        fetcher: Arc<dyn PageFetcher>,
        scorer: Arc<dyn ImpactScorer>,
        recency_days: i64,
        timeout: Duration,
    ) -> Self {
        Self {
            sources,
            fetcher,
            scorer,
            recency_days,
            timeout,
        }
    }

    pub fn sources(&self) -> &[SourceConfig] {
        &self.sources
    }

    pub fn recency_days(&self) -> i64 {
        self.recency_days
    }

    pub async fn aggregate(&self, since: Option<DateTime<Utc>>) -> Result<RunReport> {
        self.aggregate_at(Utc::now(), since).await
    }

    /// Run once against a fixed clock. Errors only when every source failed.
    pub async fn aggregate_at(
        &self,
        now: DateTime<Utc>,
        since: Option<DateTime<Utc>>,
    ) -> Result<RunReport> {
        ensure_metrics_described();
        counter!("pipeline_runs_total").increment(1);

        let today = now.date_naive();
        let results = join_all(self.sources.iter().map(|s| self.run_source(s, today))).await;

        let mut raw = Vec::new();
        let (mut ok, mut failed) = (0usize, 0usize);
        for (src, res) in self.sources.iter().zip(results) {
            match res {
                Ok(mut v) => {
                    ok += 1;
                    raw.append(&mut v);
                }
                Err(e) => {
                    failed += 1;
                    warn!(target: "pipeline", source = %src.name, error = ?e, "source failed");
                    counter!("pipeline_source_errors_total").increment(1);
                }
            }
        }

        if ok == 0 && failed > 0 {
            return Err(anyhow!("all {failed} sources failed"));
        }

        let cursor = since.map(|s| s.date_naive());
        let (articles, stale, dedup) = filter_dedup_sort(today, raw, cursor, self.recency_days);

        counter!("pipeline_articles_total").increment(articles.len() as u64);
        counter!("pipeline_stale_total").increment(stale as u64);
        counter!("pipeline_dedup_total").increment(dedup as u64);
        gauge!("pipeline_last_run_ts").set(now.timestamp() as f64);

        info!(
            target: "pipeline",
            sources_ok = ok,
            sources_failed = failed,
            kept = articles.len(),
            stale,
            dedup,
            since = ?cursor,
            "aggregation finished"
        );

        Ok(RunReport {
            today,
            articles,
            sources_ok: ok,
            sources_failed: failed,
            stale,
            dedup,
        })
    }

    async fn run_source(&self, src: &SourceConfig, today: NaiveDate) -> Result<Vec<Article>> {
        let t0 = Instant::now();
        let html = tokio::time::timeout(self.timeout, self.fetcher.fetch(&src.url))
            .await
            .with_context(|| format!("timed out after {:?}", self.timeout))??;
        // parse after the await; the DOM is not Send
        let out = extract_articles(src, &html, self.scorer.as_ref(), today);
        histogram!("pipeline_source_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(out)
    }
}

/// Keep articles inside the window (and after the cursor day), drop
/// duplicates by identity (first wins), sort newest first.
/// Returns (kept, stale_count, dedup_count).
pub fn filter_dedup_sort(
    today: NaiveDate,
    articles: Vec<Article>,
    since: Option<NaiveDate>,
    recency_days: i64,
) -> (Vec<Article>, usize, usize) {
    let cutoff = today
        .checked_sub_days(Days::new(recency_days.max(0) as u64))
        .unwrap_or(NaiveDate::MIN);

    let mut stale = 0usize;
    let mut dedup = 0usize;
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut keep = Vec::with_capacity(articles.len());

    for a in articles {
        let fresh = a.date >= cutoff && since.map_or(true, |s| a.date > s);
        if !fresh {
            stale += 1;
            continue;
        }
        if !seen.insert(a.identity()) {
            dedup += 1;
            continue;
        }
        keep.push(a);
    }

    sort_newest_first(&mut keep);
    (keep, stale, dedup)
}

/// New articles first, then cached; the union goes back through the window
/// and dedup so cached items that aged out are dropped.
pub fn merge(
    today: NaiveDate,
    new: Vec<Article>,
    cached: Vec<Article>,
    recency_days: i64,
) -> Vec<Article> {
    let all = new.into_iter().chain(cached).collect();
    filter_dedup_sort(today, all, None, recency_days).0
}

fn sort_newest_first(v: &mut [Article]) {
    v.sort_by(|a, b| b.date.cmp(&a.date));
}
