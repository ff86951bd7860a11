//! HTTP fetch and title-extraction collaborators.
//!
//! Both seams are traits so tests (and alternative transports or
//! parsers) can plug in without touching the facade. [`HttpFetcher`]
//! is the production transport: a blocking reqwest client with
//! browser-shaped headers and locale-aware language negotiation.
//! [`TitleSource`] produces the raw nested mapping the hydration
//! engine consumes; HTML extraction lives behind it, outside this
//! crate's core.

use serde_json::Value;
use tracing::debug;

use crate::error::FetchError;
use crate::options::Options;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0";

const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// ISO 639-1 tag -> Accept-Language value.
const ACCEPT_LANGUAGE: &[(&str, &str)] = &[
    ("en", "en-US,en;q=0.9"),
    ("es", "es-ES,es;q=0.9,en-US;q=0.5,en;q=0.3"),
    ("fr", "fr-FR,fr;q=0.9,en-US;q=0.5,en;q=0.3"),
    ("de", "de-DE,de;q=0.9,en-US;q=0.5,en;q=0.3"),
    ("it", "it-IT,it;q=0.9,en-US;q=0.5,en;q=0.3"),
    ("pt", "pt-BR,pt;q=0.9,en-US;q=0.5,en;q=0.3"),
    ("hi", "hi-IN,hi;q=0.9,en-US;q=0.5,en;q=0.3"),
];

/// ISO 639-1 tag -> upstream `lc-main` cookie value.
const LC_MAIN_COOKIE: &[(&str, &str)] = &[
    ("en", "en_US"),
    ("de", "de_DE"),
    ("fr", "fr_FR"),
    ("es", "es_ES"),
    ("it", "it_IT"),
    ("pt", "pt_BR"),
    ("hi", "hi_IN"),
];

fn lookup<'a>(table: &[(&str, &'a str)], tag: &str) -> Option<&'a str> {
    table
        .iter()
        .find(|(key, _)| *key == tag)
        .map(|(_, value)| *value)
}

pub(crate) fn accept_language(locale: &str) -> &'static str {
    lookup(ACCEPT_LANGUAGE, locale).unwrap_or(DEFAULT_ACCEPT_LANGUAGE)
}

pub(crate) fn lc_main_cookie(locale: &str) -> Option<String> {
    lookup(LC_MAIN_COOKIE, locale)
        .map(|lang| format!("lc-main={lang}; Domain=.imdb.com; Path=/; SameSite=None"))
}

/// Raw transport seam: fetch the body of a URL as text.
pub trait Fetch {
    fn raw(&self, url: &str, options: &Options) -> Result<String, FetchError>;
}

/// Extraction seam: the raw nested mapping for one title id, in the
/// shape the hydration engine consumes.
pub trait TitleSource {
    fn raw_title(&self, id: &str, options: &Options) -> Result<Value, FetchError>;
}

/// Production transport on a blocking reqwest client.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        // Falls back to the library default client if the builder
        // rejects the configuration.
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetch for HttpFetcher {
    fn raw(&self, url: &str, options: &Options) -> Result<String, FetchError> {
        debug!(url, locale = %options.locale, "fetching");
        let mut request = self
            .client
            .get(url)
            .header("Accept-Language", accept_language(&options.locale))
            .header("Referer", "https://www.imdb.com/");
        if let Some(cookie) = lc_main_cookie(&options.locale) {
            request = request.header("Cookie", cookie);
        }
        let transport = |source: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            source,
        };
        let response = request.send().map_err(transport)?;
        let response = response.error_for_status().map_err(transport)?;
        response.text().map_err(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_language_table() {
        assert_eq!(accept_language("it"), "it-IT,it;q=0.9,en-US;q=0.5,en;q=0.3");
        assert_eq!(accept_language("en"), DEFAULT_ACCEPT_LANGUAGE);
        // Unknown locales negotiate English.
        assert_eq!(accept_language("xx"), DEFAULT_ACCEPT_LANGUAGE);
    }

    #[test]
    fn test_lc_main_cookie() {
        assert_eq!(
            lc_main_cookie("pt").as_deref(),
            Some("lc-main=pt_BR; Domain=.imdb.com; Path=/; SameSite=None")
        );
        assert!(lc_main_cookie("xx").is_none());
    }
}
