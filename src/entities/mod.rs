//! Typed entities and the schema-directed hydration engine.
//!
//! Raw scraped data is irregular: some list-shaped fields are flat lists
//! of records, others are two-level groupings (seasons containing
//! episodes). Each entity declares its fields and a cast table mapping
//! certain field names to the entity variant their raw sub-records must
//! hydrate into; one generic cast routine then serves both shapes by
//! classifying each raw item once (flat record vs. grouping record)
//! before hydrating it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::dataset::{value_kind, Dataset, Key};
use crate::error::{EntityError, EntityResult};

mod credit;
mod episode;
mod person;
mod reference;
mod search_result;
mod season;
mod title;

pub use credit::Credit;
pub use episode::Episode;
pub use person::Person;
pub use reference::Reference;
pub use search_result::SearchResult;
pub use season::Season;
pub use title::Title;

/// The closed set of entity variants a cast table can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Title,
    Person,
    Episode,
    Season,
    Credit,
    SearchResult,
    Reference,
}

/// A named, fixed-shape record hydrated from raw nested data.
///
/// Addressing a field the variant never declared fails with
/// [`EntityError::UnknownField`] on both read and write; that is a
/// programmer error, fatal for the call, never a data-quality condition.
pub trait Entity: Default + Clone + PartialEq + Serialize + DeserializeOwned {
    const NAME: &'static str;
    const FIELDS: &'static [&'static str];
    /// Static cast table: field name -> variant its raw items hydrate
    /// into. Consulted by `apply` through [`cast_field`].
    const CASTS: &'static [(&'static str, Variant)] = &[];

    /// Hydrates one declared field from its raw value. Variants may
    /// coerce specially here (the setter escape hatch), e.g. a credit
    /// building a nested person from a raw record.
    fn apply(&mut self, field: &str, value: &Value) -> EntityResult<()>;

    /// Populates an entity field-by-field from a raw nested mapping.
    fn hydrate(raw: &Value) -> EntityResult<Self> {
        let map = raw.as_object().ok_or_else(|| EntityError::InvalidShape {
            entity: Self::NAME,
            field: "<root>".to_string(),
            found: value_kind(raw),
        })?;
        let mut entity = Self::default();
        for (field, value) in map {
            entity.apply(field, value)?;
        }
        Ok(entity)
    }

    /// Lossless conversion to a plain nested mapping, recursing through
    /// nested datasets and entities.
    fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Checked field access; unknown names fail.
    fn field(&self, name: &str) -> EntityResult<Value> {
        if !Self::FIELDS.contains(&name) {
            return Err(EntityError::UnknownField {
                entity: Self::NAME,
                field: name.to_string(),
            });
        }
        Ok(self
            .to_value()
            .get(name)
            .cloned()
            .unwrap_or(Value::Null))
    }
}

pub(crate) fn unknown_field(entity: &'static str, field: &str) -> EntityError {
    EntityError::UnknownField {
        entity,
        field: field.to_string(),
    }
}

/// Shape of one raw item inside a cast-table field, decided once before
/// hydration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ItemShape {
    /// A flat record: hydrate into one entity.
    Single,
    /// A grouping record: every attribute is itself a non-empty
    /// iterable, so the item is a nested collection of sub-records
    /// (seasons of episodes). No additional cases are inferred.
    Grouped,
}

fn classify(map: &serde_json::Map<String, Value>) -> ItemShape {
    let iterable_attrs = map
        .values()
        .filter(|v| match v {
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
            _ => false,
        })
        .count();
    if iterable_attrs == map.len() {
        ItemShape::Grouped
    } else {
        ItemShape::Single
    }
}

/// Items of a raw iterable with their positional keys.
fn entries(raw: &Value) -> EntityResult<Vec<(Key, &Value)>> {
    match raw {
        Value::Array(items) => Ok(items
            .iter()
            .enumerate()
            .map(|(i, v)| (Key::Index(i as u64), v))
            .collect()),
        Value::Object(map) => Ok(map
            .iter()
            .map(|(k, v)| (Key::Name(k.clone()), v))
            .collect()),
        other => Err(EntityError::InvalidShape {
            entity: "<cast>",
            field: "<items>".to_string(),
            found: value_kind(other),
        }),
    }
}

/// Index an item by its own truthy `id` (non-empty string or non-zero
/// number), else its positional key.
fn index_for(map: &serde_json::Map<String, Value>, fallback: Key) -> Key {
    match map.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Key::Name(id.clone()),
        Some(Value::Number(n)) => match n.as_u64() {
            Some(id) if id != 0 => Key::Index(id),
            _ => fallback,
        },
        _ => fallback,
    }
}

/// Hydrates the raw value of a cast-table field into a dataset of the
/// target variant. Null is treated as an absent field.
pub(crate) fn cast_field<E: Entity>(
    entity: &'static str,
    field: &str,
    raw: &Value,
) -> EntityResult<Dataset<E>> {
    if raw.is_null() {
        return Ok(Dataset::new());
    }
    let mut out = Dataset::new();
    for (position, item) in entries(raw)? {
        let map = item.as_object().ok_or_else(|| EntityError::InvalidShape {
            entity,
            field: field.to_string(),
            found: value_kind(item),
        })?;
        let index = index_for(map, position);
        match classify(map) {
            ItemShape::Grouped => {
                let mut nested = Dataset::new();
                for (sub_position, sub_item) in entries(item)? {
                    let sub_map =
                        sub_item
                            .as_object()
                            .ok_or_else(|| EntityError::InvalidShape {
                                entity,
                                field: field.to_string(),
                                found: value_kind(sub_item),
                            })?;
                    let sub_index = index_for(sub_map, sub_position);
                    nested.put(sub_index, E::hydrate(sub_item)?);
                }
                out.put_nested(index, nested);
            }
            ItemShape::Single => {
                out.put(index, E::hydrate(item)?);
            }
        }
    }
    Ok(out)
}

// Lenient scalar coercion for scraped data: wrong-typed attributes
// degrade to absent instead of failing hydration.

pub(crate) fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn as_bool(value: &Value) -> Option<bool> {
    value.as_bool()
}

pub(crate) fn as_string_vec(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(as_string).collect())
        .unwrap_or_default()
}

pub(crate) fn as_i64_vec(value: &Value) -> Vec<i64> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(as_i64).collect())
        .unwrap_or_default()
}

macro_rules! impl_record {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl crate::dataset::Record for $ty {
                fn record_field(&self, name: &str) -> Option<Value> {
                    Entity::field(self, name).ok().filter(|v| !v.is_null())
                }
            }
        )+
    };
}

impl_record!(Title, Person, Episode, Season, Credit, SearchResult, Reference);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_flat_vs_grouping() {
        let flat = json!({"id": "tt1", "title": "Room", "genres": ["drama"]});
        assert_eq!(classify(flat.as_object().unwrap()), ItemShape::Single);

        let grouped = json!({
            "tt1": {"id": "tt1", "title": "Pilot"},
            "tt2": {"id": "tt2", "title": "Finale"}
        });
        assert_eq!(classify(grouped.as_object().unwrap()), ItemShape::Grouped);
    }

    #[test]
    fn test_classify_empty_item_is_grouping() {
        // Vacuously all-iterable: zero attributes means zero non-iterable ones.
        let empty = json!({});
        assert_eq!(classify(empty.as_object().unwrap()), ItemShape::Grouped);
    }

    #[test]
    fn test_cast_field_indexes_by_id_with_positional_fallback() {
        let raw = json!([
            {"id": "nm1", "name": "Tommy"},
            {"name": "Greg"}
        ]);
        let people: Dataset<Person> = cast_field("Title", "actors", &raw).unwrap();
        assert!(people.has(&Key::from("nm1")));
        assert!(people.has(&Key::from(1u64)));
    }

    #[test]
    fn test_cast_field_accepts_numeric_ids() {
        let raw = json!([
            {"id": 42, "name": "Tommy"},
            {"id": 0, "name": "Greg"}
        ]);
        let people: Dataset<Person> = cast_field("Title", "actors", &raw).unwrap();
        assert!(people.has(&Key::from(42u64)));
        // A zero id is falsy and falls back to the positional key.
        assert!(people.has(&Key::from(1u64)));
    }

    #[test]
    fn test_cast_field_builds_nested_dataset_for_groupings() {
        let raw = json!({
            "1": {
                "tt1": {"id": "tt1", "title": "Pilot", "episodeNumber": 1},
                "tt2": {"id": "tt2", "title": "Finale", "episodeNumber": 2}
            }
        });
        let seasons: Dataset<Episode> = cast_field("Title", "seasons", &raw).unwrap();
        let season = seasons.get(&Key::from("1")).unwrap().nested().unwrap();
        assert_eq!(season.count(), 2);
        let pilot = season.get_leaf(&Key::from("tt1")).unwrap();
        assert_eq!(pilot.episode_number, Some(1));
    }

    #[test]
    fn test_cast_field_null_is_empty() {
        let people: Dataset<Person> = cast_field("Title", "actors", &Value::Null).unwrap();
        assert!(people.is_empty());
    }

    #[test]
    fn test_cast_field_rejects_scalar_items() {
        let result: EntityResult<Dataset<Person>> = cast_field("Title", "actors", &json!([1, 2]));
        assert!(result.is_err());
    }

    #[test]
    fn test_cast_tables_only_name_declared_fields() {
        fn check<E: Entity>() {
            for (field, _) in E::CASTS {
                assert!(E::FIELDS.contains(field), "{}: {}", E::NAME, field);
            }
        }
        check::<Title>();
        check::<Season>();
        check::<Person>();
        check::<Episode>();
        check::<Credit>();
        check::<SearchResult>();
        check::<Reference>();
    }

    #[test]
    fn test_field_access_checks_declarations() {
        let person = Person::default();
        assert!(Entity::field(&person, "name").is_ok());
        assert!(matches!(
            Entity::field(&person, "salary"),
            Err(EntityError::UnknownField { entity: "Person", .. })
        ));
    }

    #[test]
    fn test_coercions_are_lenient() {
        assert_eq!(as_i64(&json!("1999")), Some(1999));
        assert_eq!(as_i64(&json!(1999)), Some(1999));
        assert_eq!(as_i64(&json!({"x": 1})), None);
        assert_eq!(as_string(&json!(7)), Some("7".to_string()));
        assert_eq!(as_f64(&json!("7.5")), Some(7.5));
        assert_eq!(as_string_vec(&json!(["a", "b"])), vec!["a", "b"]);
    }
}
