// src/api.rs
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::cache::NewsController;

pub const CACHE_HEADER: &str = "x-news-cache";

#[derive(Clone)]
pub struct AppState {
    pub news: Arc<NewsController>,
}

impl AppState {
    pub fn new(news: Arc<NewsController>) -> Self {
        Self { news }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/news", get(get_news))
        .route("/api/cache/articles", delete(clear_cache))
        .route("/api/sources", get(list_sources))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct NewsQuery {
    since: Option<String>,
    theme: Option<String>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

async fn get_news(State(state): State<AppState>, Query(q): Query<NewsQuery>) -> Response {
    let since = match q.since.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => match parse_since(raw) {
            Some(ts) => Some(ts),
            None => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("invalid `since` value `{raw}`, expected ISO-8601"),
                )
            }
        },
    };

    match state.news.read(since).await {
        Ok((mut articles, status)) => {
            if let Some(theme) = q.theme.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                articles.retain(|a| a.themes.iter().any(|t| t.eq_ignore_ascii_case(theme)));
            }
            (
                StatusCode::OK,
                [(
                    HeaderName::from_static(CACHE_HEADER),
                    HeaderValue::from_static(status.as_str()),
                )],
                Json(articles),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = ?e, "news refresh failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
        }
    }
}

async fn clear_cache(State(state): State<AppState>) -> impl IntoResponse {
    let cleared = state.news.clear();
    Json(json!({ "message": "cache cleared", "cleared": cleared }))
}

#[derive(Serialize)]
struct SourceOut<'a> {
    name: &'a str,
    url: &'a str,
}

async fn list_sources(State(state): State<AppState>) -> Response {
    let out: Vec<SourceOut<'_>> = state
        .news
        .sources()
        .iter()
        .map(|s| SourceOut {
            name: &s.name,
            url: &s.url,
        })
        .collect();
    Json(out).into_response()
}

/// RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS` (taken as UTC) or a bare date.
pub fn parse_since(raw: &str) -> Option<DateTime<Utc>> {
    // a literal '+' in a query string arrives as a space
    let s = raw.trim().replace(' ', "+");
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&s, fmt) {
            return Some(ndt.and_utc());
        }
    }
    NaiveDate::parse_from_str(&s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}
