//! Eco News Digest: binary entrypoint.
//! Loads settings, wires the news controller and serves the HTTP API.

use std::sync::Arc;

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use eco_news_digest::config::{load_sources_default, AppConfig};
use eco_news_digest::fetch::HttpFetcher;
use eco_news_digest::metrics::Metrics;
use eco_news_digest::taxonomy::{start_hot_reload_thread, Taxonomy, TaxonomyHandle};
use eco_news_digest::{build_controller, router, AppState};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pipeline=info,cache=info,relevance=info"));

    // the runtime may already have installed a subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = AppConfig::from_env();
    tracing::info!(
        ttl_secs = config.cache_ttl.as_secs(),
        recency_days = config.recency_days,
        mode = %config.scoring_mode,
        "starting eco news digest"
    );

    let taxonomy = Taxonomy::load_or_builtin(&config.taxonomy_path);
    let handle = TaxonomyHandle::new(taxonomy);
    start_hot_reload_thread(handle.clone(), config.taxonomy_path.clone());

    let sources = load_sources_default(&config.sources_path)?;
    let fetcher = HttpFetcher::new(&config.user_agent, config.fetch_timeout)?;
    let news = build_controller(&config, sources, Arc::new(fetcher), handle);

    let metrics = Metrics::init(config.cache_ttl.as_secs()).context("metrics init")?;
    let app = router(AppState::new(Arc::new(news))).merge(metrics.router());

    Ok(app.into())
}
