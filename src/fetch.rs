// src/fetch.rs
//! Page retrieval. `PageFetcher` is the seam the pipeline fetches through;
//! `HttpFetcher` talks to the network, `StaticFetcher` serves canned pages.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the page body at `url` as text.
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Browser-like HTTP client. Many outlets serve bots an empty shell.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(5).min(timeout))
            .timeout(timeout)
            .gzip(true)
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}: bad status"))?;
        resp.text()
            .await
            .with_context(|| format!("GET {url}: reading body"))
    }
}

/// In-memory fetcher keyed by URL. Unknown URLs fail like a dead host.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("no page registered for {url}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_fetcher_serves_known_pages_only() {
        let f = StaticFetcher::new().with_page("https://a.test/", "<p>hi</p>");
        assert_eq!(f.fetch("https://a.test/").await.unwrap(), "<p>hi</p>");
        assert!(f.fetch("https://b.test/").await.is_err());
    }

    #[test]
    fn http_fetcher_builds_with_custom_agent() {
        assert!(HttpFetcher::new("eco-news-digest/test", Duration::from_secs(2)).is_ok());
    }
}
