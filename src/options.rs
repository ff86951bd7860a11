//! Runtime configuration for the scraper facade.

use std::path::PathBuf;

/// Scraper configuration. Every field has a conservative default:
/// caching off, English locale, seasons not fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Enables the persistent file cache for title lookups.
    pub cache: bool,
    /// Cache directory override; a temp-dir subfolder when unset.
    pub cache_dir: Option<PathBuf>,
    /// ISO 639-1 locale tag driving request headers (e.g. "en", "it").
    /// Unrecognized tags fall back to English headers.
    pub locale: String,
    /// Fetches the full per-season episode listing for TV series.
    pub seasons: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            cache: false,
            cache_dir: None,
            locale: "en".to_string(),
            seasons: false,
        }
    }
}

impl Options {
    /// Effective cache directory: the override, else a fixed folder
    /// under the system temp directory.
    pub fn cache_directory(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("imdb-scraper-cache"))
    }
}
