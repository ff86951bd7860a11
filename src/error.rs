//! Error handling for the IMDb scraper
//!
//! This module provides idiomatic Rust error types using thiserror for
//! better error messages and proper error chain handling.
//!
//! Propagation policy: resolver and hydration errors bubble up to the
//! caller; cache I/O failures are contained inside the cache component and
//! reported via boolean results plus logging. The only cache error that
//! crosses the boundary is a construction failure (unwritable directory).

use thiserror::Error;

/// Main error type for the scraper
#[derive(Error, Debug)]
pub enum ImdbError {
    #[error("Bad method call: '{0}'")]
    BadMethodCall(String),

    #[error("No search results found for keyword: '{keyword}'")]
    NoSearchResults { keyword: String },

    #[error("No confident match found for keyword: '{keyword}'")]
    NoConfidentMatch { keyword: String },

    #[error("Multiple search results found for keyword: '{keyword}'. Results: {}", candidates.join(", "))]
    MultipleSearchResults {
        keyword: String,
        /// Competing results as "title (year)" strings, in search rank order.
        candidates: Vec<String>,
    },

    #[error("Entity error: {0}")]
    Entity(#[from] EntityError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Entity hydration errors
///
/// `UnknownField` is a programmer-error class, not a data-quality class:
/// it means code addressed a field the entity never declared, and should
/// be treated as fatal for the call.
#[derive(Error, Debug)]
pub enum EntityError {
    #[error("{entity}: property '{field}' does not exist")]
    UnknownField { entity: &'static str, field: String },

    #[error("{entity}: cannot hydrate '{field}' from {found}")]
    InvalidShape {
        entity: &'static str,
        field: String,
        found: &'static str,
    },
}

/// Dataset construction errors
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Dataset items must be a map or an iterable, got {found}")]
    InvalidItems { found: &'static str },
}

/// Transport errors from the fetch collaborator
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Transport error fetching '{url}': {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("No title data available for '{id}'")]
    NoTitleData { id: String },
}

/// Cache construction errors
///
/// Everything past construction degrades to "always miss" instead of
/// erroring; see the cache module.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache directory '{path}' is not writable: {source}")]
    DirectoryUnwritable {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type aliases for convenience
pub type ImdbResult<T> = Result<T, ImdbError>;
pub type EntityResult<T> = Result<T, EntityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiple_results_message_lists_candidates() {
        let err = ImdbError::MultipleSearchResults {
            keyword: "the matrix".to_string(),
            candidates: vec![
                "The Matrix (1999)".to_string(),
                "The Matrix Reloaded (2003)".to_string(),
            ],
        };
        let message = err.to_string();
        assert!(message.contains("the matrix"));
        assert!(message.contains("The Matrix (1999), The Matrix Reloaded (2003)"));
    }

    #[test]
    fn test_unknown_field_names_entity_and_field() {
        let err = EntityError::UnknownField {
            entity: "Title",
            field: "director".to_string(),
        };
        assert_eq!(err.to_string(), "Title: property 'director' does not exist");
    }
}
