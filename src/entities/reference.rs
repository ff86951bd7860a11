use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{as_string, unknown_field, Entity};
use crate::error::EntityResult;

/// A lightweight reference to another title (e.g. a "similar" entry).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Reference {
    /// Unique IMDb ID (e.g. "tt1234567").
    pub id: Option<String>,
    pub title: Option<String>,
    /// URL of the IMDb page.
    pub link: Option<String>,
}

impl Entity for Reference {
    const NAME: &'static str = "Reference";
    const FIELDS: &'static [&'static str] = &["id", "title", "link"];

    fn apply(&mut self, field: &str, value: &Value) -> EntityResult<()> {
        match field {
            "id" => self.id = as_string(value),
            "title" => self.title = as_string(value),
            "link" => self.link = as_string(value),
            _ => return Err(unknown_field(Self::NAME, field)),
        }
        Ok(())
    }
}
