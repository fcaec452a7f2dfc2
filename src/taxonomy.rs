// src/taxonomy.rs
//! Keyword taxonomy: exclusion list, domain-relevance list, and the ordered
//! positive-theme map. Loaded from TOML so theme schemes can be swapped per
//! deployment.

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

// --- env defaults & names ---
pub const DEFAULT_TAXONOMY_PATH: &str = "config/taxonomy.toml";
pub const ENV_TAXONOMY_PATH: &str = "TAXONOMY_CONFIG_PATH";

/// Impact scheme compiled into the binary; used when no file is configured.
const BUILTIN_TAXONOMY: &str = include_str!("../config/taxonomy.toml");

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct TaxonomyRoot {
    pub taxonomy: TaxonomySection,
    #[serde(default)]
    pub themes: Vec<ThemeCfg>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaxonomySection {
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub relevance: Vec<String>,
}

fn default_scheme() -> String {
    "custom".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThemeCfg {
    pub label: String,
    pub keywords: Vec<String>,
}

/// A theme with its keywords lower-cased for matching.
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub label: String,
    pub keywords: Vec<String>,
}

/// Compiled taxonomy. Keyword lists are lower-cased, trimmed and de-duplicated.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    pub scheme: String,
    exclude: Vec<String>,
    relevance: Vec<String>,
    themes: Vec<Theme>,
}

impl Taxonomy {
    /// Load `path`, falling back to the built-in impact scheme when the file
    /// is missing or invalid.
    pub fn load_or_builtin(path: &Path) -> Self {
        if !path.exists() {
            info!(target: "relevance", path = %path.display(), "no taxonomy file, using built-in");
            return Self::builtin();
        }
        Self::from_path(path).unwrap_or_else(|e| {
            warn!(target: "relevance", error = ?e, "taxonomy file unusable, using built-in");
            Self::builtin()
        })
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading taxonomy from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let root: TaxonomyRoot = toml::from_str(toml_str)?;
        if root.themes.is_empty() {
            anyhow::bail!("taxonomy must define at least one [[themes]] table");
        }

        let mut themes: Vec<Theme> = Vec::with_capacity(root.themes.len());
        for t in root.themes {
            let label = t.label.trim().to_string();
            if label.is_empty() {
                anyhow::bail!("theme label must not be empty");
            }
            if themes.iter().any(|x| x.label == label) {
                anyhow::bail!("duplicate theme label `{label}`");
            }
            let keywords = clean_keywords(t.keywords);
            if keywords.is_empty() {
                anyhow::bail!("theme `{label}` has no keywords");
            }
            themes.push(Theme { label, keywords });
        }

        Ok(Self {
            scheme: root.taxonomy.scheme,
            exclude: clean_keywords(root.taxonomy.exclude),
            relevance: clean_keywords(root.taxonomy.relevance),
            themes,
        })
    }

    /// The compiled-in impact scheme (recovery, breakthrough, community,
    /// conservation, hope).
    pub fn builtin() -> Self {
        Self::from_toml_str(BUILTIN_TAXONOMY).expect("built-in taxonomy is valid")
    }

    /// First exclusion keyword found in already lower-cased `text`.
    pub fn excluded_by<'a>(&'a self, text: &str) -> Option<&'a str> {
        self.exclude
            .iter()
            .find(|k| text.contains(k.as_str()))
            .map(String::as_str)
    }

    pub fn is_in_domain(&self, text: &str) -> bool {
        self.relevance.iter().any(|k| text.contains(k.as_str()))
    }

    /// `(label, hit_count)` for every theme with at least one hit, in
    /// configuration order.
    pub fn theme_hits(&self, text: &str) -> Vec<(&str, usize)> {
        self.themes
            .iter()
            .filter_map(|t| {
                let hits = t.keywords.iter().filter(|k| text.contains(k.as_str())).count();
                (hits > 0).then_some((t.label.as_str(), hits))
            })
            .collect()
    }

    pub fn theme_labels(&self) -> Vec<&str> {
        self.themes.iter().map(|t| t.label.as_str()).collect()
    }
}

fn clean_keywords(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let k = it.trim().to_lowercase();
        if !k.is_empty() && !out.contains(&k) {
            out.push(k);
        }
    }
    out
}

/* ----------------------------
Thread-safe handle + hot reload
---------------------------- */

/// Shared taxonomy that can be swapped at runtime.
/// - Enable file polling by setting TAXONOMY_HOT_RELOAD=1
/// - Dev-gated: active only in debug builds or when SHUTTLE_ENV is local/dev.
#[derive(Debug, Clone)]
pub struct TaxonomyHandle {
    inner: Arc<RwLock<Taxonomy>>,
}

impl TaxonomyHandle {
    pub fn new(taxonomy: Taxonomy) -> Self {
        Self {
            inner: Arc::new(RwLock::new(taxonomy)),
        }
    }

    /// Run `f` against the current taxonomy.
    pub fn with<R>(&self, f: impl FnOnce(&Taxonomy) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(|p| p.into_inner());
        f(&guard)
    }

    pub fn replace(&self, taxonomy: Taxonomy) {
        let mut guard = self.inner.write().unwrap_or_else(|p| p.into_inner());
        *guard = taxonomy;
    }
}

fn hot_reload_enabled() -> bool {
    let want = std::env::var("TAXONOMY_HOT_RELOAD").ok().as_deref() == Some("1");
    want && crate::config::is_dev_env()
}

/// Poll `path` every 2s and swap the taxonomy when its mtime changes.
/// Invalid files are logged and ignored; the previous taxonomy stays active.
pub fn start_hot_reload_thread(handle: TaxonomyHandle, path: PathBuf) {
    if !hot_reload_enabled() {
        return;
    }

    thread::spawn(move || {
        let poll = Duration::from_secs(2);
        let mut last_mtime: Option<SystemTime> = None;

        loop {
            if let Ok(mtime) = fs::metadata(&path).and_then(|m| m.modified()) {
                let changed = matches!(last_mtime, Some(prev) if mtime > prev);
                if changed {
                    match Taxonomy::from_path(&path) {
                        Ok(fresh) => {
                            info!(target: "relevance", scheme = %fresh.scheme, "taxonomy reloaded");
                            handle.replace(fresh);
                        }
                        Err(e) => warn!(target: "relevance", error = ?e, "taxonomy reload failed"),
                    }
                }
                last_mtime = Some(mtime);
            }
            thread::sleep(poll);
        }
    });
}
