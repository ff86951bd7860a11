use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{as_string, unknown_field, Entity};
use crate::error::EntityResult;

/// A person attached to a title: cast member, director, writer, ...
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Person {
    /// The kind of involvement (e.g. "actor", "director").
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Unique IMDb ID (e.g. "nm0000226").
    pub id: Option<String>,
    pub name: Option<String>,
    /// URL of the IMDb page.
    pub link: Option<String>,
    /// The character played, when the person is a cast member.
    pub character: Option<String>,
    pub image: Option<String>,
}

impl Person {
    pub const TYPE_ACTOR: &'static str = "actor";
    pub const TYPE_DIRECTOR: &'static str = "director";
    pub const TYPE_WRITER: &'static str = "writer";
    pub const TYPE_PRODUCER: &'static str = "producer";
}

impl Entity for Person {
    const NAME: &'static str = "Person";
    const FIELDS: &'static [&'static str] = &["type", "id", "name", "link", "character", "image"];

    fn apply(&mut self, field: &str, value: &Value) -> EntityResult<()> {
        match field {
            "type" => self.kind = as_string(value),
            "id" => self.id = as_string(value),
            "name" => self.name = as_string(value),
            "link" => self.link = as_string(value),
            "character" => self.character = as_string(value),
            "image" => self.image = as_string(value),
            _ => return Err(unknown_field(Self::NAME, field)),
        }
        Ok(())
    }
}
