// src/config/sources.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use url::Url;

/// One news outlet to scrape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Unique display label, copied into every article from this source.
    pub name: String,
    /// Page fetched for candidates.
    pub url: String,
    /// Base for resolving relative links.
    pub base_url: String,
    /// CSS selector pointing at the publish date inside an entry.
    #[serde(default)]
    pub date_selector: Option<String>,
}

impl SourceConfig {
    pub fn new(name: &str, url: &str, base_url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            base_url: base_url.to_string(),
            date_selector: None,
        }
    }

    pub fn with_date_selector(mut self, selector: &str) -> Self {
        self.date_selector = Some(selector.to_string());
        self
    }
}

#[derive(Deserialize)]
struct SourcesFile {
    sources: Vec<SourceConfig>,
}

/// Load sources from an explicit TOML file.
pub fn load_sources_from(path: &Path) -> Result<Vec<SourceConfig>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    parse_sources(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Load sources from `path` if it exists, otherwise the built-in list.
pub fn load_sources_default(path: &Path) -> Result<Vec<SourceConfig>> {
    if path.exists() {
        return load_sources_from(path);
    }
    tracing::info!(path = %path.display(), "no sources file, using built-in list");
    Ok(default_sources())
}

pub fn parse_sources(s: &str) -> Result<Vec<SourceConfig>> {
    let file: SourcesFile = toml::from_str(s)?;
    validate(file.sources)
}

fn validate(items: Vec<SourceConfig>) -> Result<Vec<SourceConfig>> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for mut src in items {
        src.name = src.name.trim().to_string();
        if src.name.is_empty() {
            return Err(anyhow!("source with empty name"));
        }
        if !seen.insert(src.name.to_lowercase()) {
            return Err(anyhow!("duplicate source name `{}`", src.name));
        }
        Url::parse(&src.url).with_context(|| format!("source `{}`: bad url", src.name))?;
        Url::parse(&src.base_url)
            .with_context(|| format!("source `{}`: bad base_url", src.name))?;
        src.date_selector = src
            .date_selector
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        out.push(src);
    }
    Ok(out)
}

/// The outlets the service was originally deployed against.
pub fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::new(
            "The Guardian",
            "https://www.theguardian.com/environment",
            "https://www.theguardian.com",
        ),
        SourceConfig::new(
            "CNN",
            "https://www.cnn.com/world/cnn-climate",
            "https://www.cnn.com",
        ),
        SourceConfig::new(
            "ABC News",
            "https://www.abc.net.au/news/environment",
            "https://www.abc.net.au",
        ),
        SourceConfig::new(
            "Sydney Morning Herald",
            "https://www.smh.com.au/environment",
            "https://www.smh.com.au",
        ),
        SourceConfig::new(
            "The Age",
            "https://www.theage.com.au/environment",
            "https://www.theage.com.au",
        ),
        SourceConfig::new(
            "New York Times",
            "https://www.nytimes.com/section/climate",
            "https://www.nytimes.com",
        ),
        SourceConfig::new(
            "The Conversation Environment",
            "https://theconversation.com/us/environment",
            "https://theconversation.com",
        ),
        SourceConfig::new(
            "National Geographic",
            "https://www.nationalgeographic.com/environment",
            "https://www.nationalgeographic.com",
        ),
        SourceConfig::new(
            "Scientific American",
            "https://www.scientificamerican.com/earth-and-environment",
            "https://www.scientificamerican.com",
        ),
        SourceConfig::new("EcoWatch", "https://www.ecowatch.com", "https://www.ecowatch.com"),
        SourceConfig::new(
            "Environmental News Network",
            "https://www.enn.com",
            "https://www.enn.com",
        ),
        SourceConfig::new("GreenBiz", "https://www.greenbiz.com", "https://www.greenbiz.com"),
        SourceConfig::new(
            "CleanTechnica",
            "https://cleantechnica.com",
            "https://cleantechnica.com",
        ),
        SourceConfig::new(
            "Yale Environment 360",
            "https://e360.yale.edu",
            "https://e360.yale.edu",
        ),
    ]
}
