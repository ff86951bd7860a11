use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{as_i64, as_string, unknown_field, Entity};
use crate::error::EntityResult;

/// One raw search-result candidate consumed by the resolver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchResult {
    /// Unique IMDb ID (e.g. "tt1234567").
    pub id: Option<String>,
    pub title: Option<String>,
    pub image: Option<String>,
    pub year: Option<i64>,
    /// Display type (e.g. "feature", "TV series").
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Category tag (e.g. "movie", "tvSeries", "tvMiniSeries").
    pub category: Option<String>,
    pub starring: Option<String>,
    /// Rank in the upstream search order.
    pub rank: Option<i64>,
}

impl SearchResult {
    pub fn is_movie(&self) -> bool {
        self.category.as_deref() == Some("movie")
    }

    pub fn is_tv_series(&self) -> bool {
        matches!(self.category.as_deref(), Some("tvSeries" | "tvMiniSeries"))
    }
}

impl Entity for SearchResult {
    const NAME: &'static str = "SearchResult";
    const FIELDS: &'static [&'static str] = &[
        "id", "title", "image", "year", "type", "category", "starring", "rank",
    ];

    fn apply(&mut self, field: &str, value: &Value) -> EntityResult<()> {
        match field {
            "id" => self.id = as_string(value),
            "title" => self.title = as_string(value),
            "image" => self.image = as_string(value),
            "year" => self.year = as_i64(value),
            "type" => self.kind = as_string(value),
            "category" => self.category = as_string(value),
            "starring" => self.starring = as_string(value),
            "rank" => self.rank = as_i64(value),
            _ => return Err(unknown_field(Self::NAME, field)),
        }
        Ok(())
    }
}
