use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{as_string, unknown_field, Entity, Person};
use crate::error::EntityResult;

/// A credited involvement in a title, pairing a role with a person.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Credit {
    /// The role of the credit (e.g. "actor", "director").
    pub role: Option<String>,
    /// How the person was involved (e.g. "screenplay by").
    pub involvement: Option<String>,
    pub person: Option<Person>,
}

impl Entity for Credit {
    const NAME: &'static str = "Credit";
    const FIELDS: &'static [&'static str] = &["role", "involvement", "person"];

    fn apply(&mut self, field: &str, value: &Value) -> EntityResult<()> {
        match field {
            "role" => self.role = as_string(value),
            "involvement" => self.involvement = as_string(value),
            // Setter escape hatch: a raw person record hydrates into a
            // nested entity rather than staying a plain mapping.
            "person" => {
                self.person = if value.is_null() {
                    None
                } else {
                    Some(Person::hydrate(value)?)
                };
            }
            _ => return Err(unknown_field(Self::NAME, field)),
        }
        Ok(())
    }
}
