// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod cache;
pub mod config;
pub mod dates;
pub mod extract;
pub mod fetch;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod relevance;
pub mod sentiment;
pub mod taxonomy;

use std::sync::Arc;

pub use crate::api::{router, AppState};
pub use crate::models::Article;

use crate::cache::{ArticleCache, NewsController};
use crate::config::{AppConfig, SourceConfig};
use crate::fetch::PageFetcher;
use crate::pipeline::Pipeline;
use crate::relevance::RelevanceScorer;
use crate::taxonomy::TaxonomyHandle;

/// Wire scorer, pipeline and cache from settings.
pub fn build_controller(
    config: &AppConfig,
    sources: Vec<SourceConfig>,
    fetcher: Arc<dyn PageFetcher>,
    taxonomy: TaxonomyHandle,
) -> NewsController {
    let scorer = Arc::new(RelevanceScorer::new(taxonomy, config.scoring_mode));
    let pipeline = Pipeline::new(
        sources,
        fetcher,
        scorer,
        config.recency_days,
        config.fetch_timeout,
    );
    NewsController::new(ArticleCache::new(config.cache_ttl), pipeline)
}
