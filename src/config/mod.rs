// src/config/mod.rs
//! Runtime configuration: process settings from the environment and the
//! news source list from TOML.

pub mod app;
pub mod sources;

pub use app::AppConfig;
pub use sources::{load_sources_default, load_sources_from, SourceConfig};

/// Dev environment: debug build, or SHUTTLE_ENV in {local, development, dev}.
pub fn is_dev_env() -> bool {
    cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        )
}
