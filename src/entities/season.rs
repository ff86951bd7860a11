use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{as_i64, as_string, cast_field, unknown_field, Entity, Episode, Variant};
use crate::dataset::Dataset;
use crate::error::EntityResult;

/// A season of a TV show.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Season {
    /// Unique season ID (e.g. "S01").
    pub id: Option<String>,
    pub number: Option<i64>,
    pub episodes: Dataset<Episode>,
}

impl Entity for Season {
    const NAME: &'static str = "Season";
    const FIELDS: &'static [&'static str] = &["id", "number", "episodes"];
    const CASTS: &'static [(&'static str, Variant)] = &[("episodes", Variant::Episode)];

    fn apply(&mut self, field: &str, value: &Value) -> EntityResult<()> {
        match field {
            "id" => self.id = as_string(value),
            "number" => self.number = as_i64(value),
            "episodes" => self.episodes = cast_field(Self::NAME, field, value)?,
            _ => return Err(unknown_field(Self::NAME, field)),
        }
        Ok(())
    }
}
