//! IMDb metadata scraper.
//!
//! Core pieces:
//! - [`dataset`] — generic recursive ordered collection backing every
//!   list-shaped result.
//! - [`entities`] — typed entities and the schema-directed hydration
//!   engine turning raw nested data into them.
//! - [`cache`] — compressed persistent file cache with TTL expiry and
//!   once-per-process startup pruning.
//! - [`imdb`] — the facade: suggestion search, free-text narrowing to a
//!   single IMDb id, and id-based title lookup.
//!
//! Transport and HTML extraction sit behind the [`client`] seams so
//! they can be replaced in tests.

pub mod cache;
pub mod client;
pub mod dataset;
pub mod entities;
pub mod error;
pub mod imdb;
pub mod options;

pub use cache::{Cache, Compression, CompressionStats};
pub use client::{Fetch, HttpFetcher, TitleSource};
pub use dataset::{Dataset, Item, Key, Record, SortMode};
pub use entities::{
    Credit, Entity, Episode, Person, Reference, SearchResult, Season, Title, Variant,
};
pub use error::{
    CacheError, DatasetError, EntityError, FetchError, ImdbError, ImdbResult,
};
pub use imdb::{Category, Imdb};
pub use options::Options;
