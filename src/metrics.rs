// src/metrics.rs
use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once per process) and publish the
    /// configured cache TTL.
    pub fn init(cache_ttl_secs: u64) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        describe_gauge!("news_cache_ttl_secs", "Configured article cache TTL.");
        gauge!("news_cache_ttl_secs").set(cache_ttl_secs as f64);

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` in the Prometheus text format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
