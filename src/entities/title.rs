use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    as_bool, as_f64, as_i64, as_i64_vec, as_string, as_string_vec, cast_field, unknown_field,
    Credit, Entity, Episode, Person, Reference, Variant,
};
use crate::dataset::Dataset;
use crate::error::EntityResult;

/// Detailed information about a movie or TV show.
///
/// `seasons` is a two-level shape: one nested dataset of episodes per
/// season key, produced by the grouping branch of the cast routine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Title {
    /// Unique IMDb ID (e.g. "tt1234567").
    pub id: Option<String>,
    pub is_tv_series: bool,
    /// URL of the IMDb page.
    pub link: Option<String>,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub year: Option<i64>,
    /// Display length (e.g. "2h 15m").
    pub length: Option<String>,
    pub rating: Option<f64>,
    pub rating_votes: Option<i64>,
    pub popularity_score: Option<i64>,
    pub meta_score: Option<i64>,
    pub genres: Vec<String>,
    pub poster_url: Option<String>,
    pub trailer_url: Option<String>,
    pub plot: Option<String>,
    pub actors: Dataset<Person>,
    pub similars: Dataset<Reference>,
    /// Season numbers present (e.g. [1, 2, 3, 4] for a 4-season show).
    pub season_refs: Vec<i64>,
    pub seasons: Dataset<Episode>,
    pub credits: Dataset<Credit>,
    /// Raw metadata passed through untyped.
    pub metadata: Value,
}

impl Entity for Title {
    const NAME: &'static str = "Title";
    const FIELDS: &'static [&'static str] = &[
        "id",
        "isTvSeries",
        "link",
        "title",
        "originalTitle",
        "year",
        "length",
        "rating",
        "ratingVotes",
        "popularityScore",
        "metaScore",
        "genres",
        "posterUrl",
        "trailerUrl",
        "plot",
        "actors",
        "similars",
        "seasonRefs",
        "seasons",
        "credits",
        "metadata",
    ];
    const CASTS: &'static [(&'static str, Variant)] = &[
        ("actors", Variant::Person),
        ("similars", Variant::Reference),
        ("seasons", Variant::Episode),
        ("credits", Variant::Credit),
    ];

    fn apply(&mut self, field: &str, value: &Value) -> EntityResult<()> {
        match field {
            "id" => self.id = as_string(value),
            "isTvSeries" => self.is_tv_series = as_bool(value).unwrap_or(false),
            "link" => self.link = as_string(value),
            "title" => self.title = as_string(value),
            "originalTitle" => self.original_title = as_string(value),
            "year" => self.year = as_i64(value),
            "length" => self.length = as_string(value),
            "rating" => self.rating = as_f64(value),
            "ratingVotes" => self.rating_votes = as_i64(value),
            "popularityScore" => self.popularity_score = as_i64(value),
            "metaScore" => self.meta_score = as_i64(value),
            "genres" => self.genres = as_string_vec(value),
            "posterUrl" => self.poster_url = as_string(value),
            "trailerUrl" => self.trailer_url = as_string(value),
            "plot" => self.plot = as_string(value),
            "actors" => self.actors = cast_field(Self::NAME, field, value)?,
            "similars" => self.similars = cast_field(Self::NAME, field, value)?,
            "seasonRefs" => self.season_refs = as_i64_vec(value),
            "seasons" => self.seasons = cast_field(Self::NAME, field, value)?,
            "credits" => self.credits = cast_field(Self::NAME, field, value)?,
            "metadata" => self.metadata = value.clone(),
            _ => return Err(unknown_field(Self::NAME, field)),
        }
        Ok(())
    }
}
