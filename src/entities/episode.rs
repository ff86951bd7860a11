use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{as_f64, as_i64, as_string, unknown_field, Entity};
use crate::error::EntityResult;

/// An episode of a TV show.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Episode {
    /// Unique IMDb ID (e.g. "tt1234567").
    pub id: Option<String>,
    /// URL of the episode's poster.
    pub img: Option<String>,
    pub title: Option<String>,
    /// URL of the episode's IMDb page.
    pub link: Option<String>,
    pub season_number: Option<i64>,
    pub episode_number: Option<i64>,
    pub air_date: Option<String>,
    pub plot: Option<String>,
    pub rating: Option<f64>,
    pub rating_votes: Option<i64>,
}

impl Entity for Episode {
    const NAME: &'static str = "Episode";
    const FIELDS: &'static [&'static str] = &[
        "id",
        "img",
        "title",
        "link",
        "seasonNumber",
        "episodeNumber",
        "airDate",
        "plot",
        "rating",
        "ratingVotes",
    ];

    fn apply(&mut self, field: &str, value: &Value) -> EntityResult<()> {
        match field {
            "id" => self.id = as_string(value),
            "img" => self.img = as_string(value),
            "title" => self.title = as_string(value),
            "link" => self.link = as_string(value),
            "seasonNumber" => self.season_number = as_i64(value),
            "episodeNumber" => self.episode_number = as_i64(value),
            "airDate" => self.air_date = as_string(value),
            "plot" => self.plot = as_string(value),
            "rating" => self.rating = as_f64(value),
            "ratingVotes" => self.rating_votes = as_i64(value),
            _ => return Err(unknown_field(Self::NAME, field)),
        }
        Ok(())
    }
}
