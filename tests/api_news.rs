// tests/api_news.rs
//
// HTTP-level tests for the news API Router without opening sockets.
// Pages come from an in-memory StaticFetcher.
//
// Covered:
// - GET /health, GET /api/sources
// - GET /api/news: MISS → HIT, identical bodies, theme filter, bad `since`
// - DELETE /api/cache/articles → next read is a MISS again
// - every source failing → 500 with an error body

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{Days, Utc};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use eco_news_digest::config::{AppConfig, SourceConfig};
use eco_news_digest::fetch::StaticFetcher;
use eco_news_digest::taxonomy::{Taxonomy, TaxonomyHandle};
use eco_news_digest::{build_controller, router, AppState};

const BODY_LIMIT: usize = 1024 * 1024;

fn days_ago(n: u64) -> String {
    Utc::now()
        .date_naive()
        .checked_sub_days(Days::new(n))
        .unwrap()
        .format("%Y-%m-%d")
        .to_string()
}

fn page() -> String {
    format!(
        r#"<html><body>
        <article>
          <h2 class="entry-title">Coral Reef Recovery Accelerates After Restoration Project</h2>
          <a href="/story1">Read more</a>
          <time datetime="{d2}">two days ago</time>
        </article>
        <article>
          <h2 class="entry-title">Rewilding project sees beavers thriving again</h2>
          <a href="/beavers">Read more</a>
          <time datetime="{d1}">yesterday</time>
        </article>
        <article>
          <h2 class="entry-title">Local Election Results Announced Today For New Council</h2>
          <a href="/election">Read more</a>
          <time datetime="{d1}">yesterday</time>
        </article>
        </body></html>"#,
        d1 = days_ago(1),
        d2 = days_ago(2),
    )
}

fn test_router(fetcher: StaticFetcher) -> Router {
    let sources = vec![SourceConfig::new(
        "Example",
        "https://example.test/env",
        "https://example.test",
    )];
    let news = build_controller(
        &AppConfig::default(),
        sources,
        Arc::new(fetcher),
        TaxonomyHandle::new(Taxonomy::builtin()),
    );
    router(AppState::new(Arc::new(news)))
}

fn healthy_router() -> Router {
    test_router(StaticFetcher::new().with_page("https://example.test/env", &page()))
}

async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let cache = resp
        .headers()
        .get("x-news-cache")
        .map(|v| v.to_str().expect("ascii header").to_string());
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, cache, bytes)
}

#[tokio::test]
async fn health_returns_ok() {
    let app = healthy_router();
    let (status, _, bytes) = send(&app, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(bytes).unwrap(), "ok");
}

#[tokio::test]
async fn news_miss_then_identical_hit() {
    let app = healthy_router();

    let (status, cache, first) = send(&app, "GET", "/api/news").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache.as_deref(), Some("MISS"));

    let v: Json = serde_json::from_slice(&first).expect("json");
    let items = v.as_array().expect("array");
    assert_eq!(items.len(), 2, "election story must be filtered: {v}");

    // newest first, UI field names
    assert_eq!(items[0]["title"], "Rewilding project sees beavers thriving again");
    assert_eq!(items[0]["link"], "https://example.test/beavers");
    assert_eq!(items[0]["source"], "Example");
    assert_eq!(items[0]["date"], days_ago(1));
    assert!(items[0]["sentiment"].as_f64().unwrap() > 0.0);
    assert!(items[1]["themes"]
        .as_array()
        .unwrap()
        .iter()
        .any(|t| t == "conservation"));

    let (status, cache, second) = send(&app, "GET", "/api/news").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache.as_deref(), Some("HIT"));
    assert_eq!(first, second);
}

#[tokio::test]
async fn theme_filter_narrows_served_set() {
    let app = healthy_router();
    let (_, _, bytes) = send(&app, "GET", "/api/news?theme=Conservation").await;
    let v: Json = serde_json::from_slice(&bytes).unwrap();
    let items = v.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(
        items[0]["title"],
        "Coral Reef Recovery Accelerates After Restoration Project"
    );

    // cache still holds both
    let (_, cache, bytes) = send(&app, "GET", "/api/news").await;
    assert_eq!(cache.as_deref(), Some("HIT"));
    let v: Json = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn bad_since_is_a_client_error() {
    let app = healthy_router();
    let (status, _, bytes) = send(&app, "GET", "/api/news?since=last-tuesday").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let v: Json = serde_json::from_slice(&bytes).unwrap();
    assert!(v["error"].as_str().unwrap().contains("since"));
}

#[tokio::test]
async fn since_with_nothing_newer_serves_cache() {
    let app = healthy_router();
    let (_, cache, first) = send(&app, "GET", "/api/news").await;
    assert_eq!(cache.as_deref(), Some("MISS"));

    let uri = format!("/api/news?since={}", days_ago(0));
    let (status, cache, again) = send(&app, "GET", &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache.as_deref(), Some("HIT"));
    assert_eq!(first, again);
}

#[tokio::test]
async fn delete_clears_cache() {
    let app = healthy_router();
    send(&app, "GET", "/api/news").await;

    let (status, _, bytes) = send(&app, "DELETE", "/api/cache/articles").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v["cleared"], 2);
    assert!(v["message"].is_string());

    let (_, cache, _) = send(&app, "GET", "/api/news").await;
    assert_eq!(cache.as_deref(), Some("MISS"));
}

#[tokio::test]
async fn all_sources_failing_is_a_server_error() {
    let app = test_router(StaticFetcher::new());
    let (status, cache, bytes) = send(&app, "GET", "/api/news").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(cache.is_none());
    let v: Json = serde_json::from_slice(&bytes).unwrap();
    assert!(v["error"].as_str().unwrap().contains("sources failed"));
}

#[tokio::test]
async fn sources_endpoint_lists_configured_outlets() {
    let app = healthy_router();
    let (status, _, bytes) = send(&app, "GET", "/api/sources").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v[0]["name"], "Example");
    assert_eq!(v[0]["url"], "https://example.test/env");
}
