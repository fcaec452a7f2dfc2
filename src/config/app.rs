// src/config/app.rs
use std::path::PathBuf;
use std::time::Duration;

use crate::relevance::ScoringMode;
use crate::taxonomy::{DEFAULT_TAXONOMY_PATH, ENV_TAXONOMY_PATH};

pub const ENV_CACHE_TTL_SECS: &str = "NEWS_CACHE_TTL_SECS";
pub const ENV_RECENCY_DAYS: &str = "NEWS_RECENCY_DAYS";
pub const ENV_FETCH_TIMEOUT_SECS: &str = "NEWS_FETCH_TIMEOUT_SECS";
pub const ENV_SCORING_MODE: &str = "NEWS_SCORING_MODE";
pub const ENV_SOURCES_PATH: &str = "NEWS_SOURCES_PATH";
pub const ENV_USER_AGENT: &str = "NEWS_USER_AGENT";

pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
pub const DEFAULT_RECENCY_DAYS: i64 = 30;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_SOURCES_PATH: &str = "config/sources.toml";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Process-wide settings. Unset or malformed variables fall back to defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub cache_ttl: Duration,
    pub recency_days: i64,
    pub fetch_timeout: Duration,
    pub scoring_mode: ScoringMode,
    pub sources_path: PathBuf,
    pub taxonomy_path: PathBuf,
    pub user_agent: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            recency_days: DEFAULT_RECENCY_DAYS,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            scoring_mode: ScoringMode::default(),
            sources_path: PathBuf::from(DEFAULT_SOURCES_PATH),
            taxonomy_path: PathBuf::from(DEFAULT_TAXONOMY_PATH),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let d = Self::default();

        let scoring_mode = match std::env::var(ENV_SCORING_MODE) {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "invalid {ENV_SCORING_MODE}, using default");
                d.scoring_mode
            }),
            Err(_) => d.scoring_mode,
        };

        Self {
            cache_ttl: parse_env::<u64>(ENV_CACHE_TTL_SECS)
                .filter(|v| *v > 0)
                .map(Duration::from_secs)
                .unwrap_or(d.cache_ttl),
            recency_days: parse_env::<i64>(ENV_RECENCY_DAYS)
                .filter(|v| *v > 0)
                .unwrap_or(d.recency_days),
            fetch_timeout: parse_env::<u64>(ENV_FETCH_TIMEOUT_SECS)
                .filter(|v| *v > 0)
                .map(Duration::from_secs)
                .unwrap_or(d.fetch_timeout),
            scoring_mode,
            sources_path: std::env::var(ENV_SOURCES_PATH)
                .map(PathBuf::from)
                .unwrap_or(d.sources_path),
            taxonomy_path: std::env::var(ENV_TAXONOMY_PATH)
                .map(PathBuf::from)
                .unwrap_or(d.taxonomy_path),
            user_agent: std::env::var(ENV_USER_AGENT)
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(d.user_agent),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn clear() {
        for k in [
            ENV_CACHE_TTL_SECS,
            ENV_RECENCY_DAYS,
            ENV_FETCH_TIMEOUT_SECS,
            ENV_SCORING_MODE,
            ENV_SOURCES_PATH,
            ENV_USER_AGENT,
            ENV_TAXONOMY_PATH,
        ] {
            env::remove_var(k);
        }
    }

    #[serial_test::serial]
    #[test]
    fn defaults_without_env() {
        clear();
        let c = AppConfig::from_env();
        assert_eq!(c.cache_ttl, Duration::from_secs(3600));
        assert_eq!(c.recency_days, 30);
        assert_eq!(c.scoring_mode, ScoringMode::Composite);
        assert_eq!(c.sources_path, PathBuf::from("config/sources.toml"));
    }

    #[serial_test::serial]
    #[test]
    fn env_overrides_and_bad_values_fall_back() {
        clear();
        env::set_var(ENV_CACHE_TTL_SECS, "120");
        env::set_var(ENV_RECENCY_DAYS, "not-a-number");
        env::set_var(ENV_FETCH_TIMEOUT_SECS, "0");
        env::set_var(ENV_SCORING_MODE, "normalized");
        let c = AppConfig::from_env();
        assert_eq!(c.cache_ttl, Duration::from_secs(120));
        assert_eq!(c.recency_days, 30);
        assert_eq!(c.fetch_timeout, Duration::from_secs(15));
        assert_eq!(c.scoring_mode, ScoringMode::Normalized);
        clear();
    }
}
