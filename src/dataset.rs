//! Recursive ordered collection used throughout the scraper.
//!
//! A `Dataset<V>` is an ordered key -> value store usable as both a list
//! and a map. Values are either leaves or nested `Dataset`s, which lets
//! one container hold arbitrarily nested shapes (seasons of episodes,
//! credit groups, flat search results) without per-shape types.
//!
//! Every transformation (`map`, `filter`, `sort_by`, `slice`, `except`,
//! `pluck`, ...) returns a new `Dataset` and never mutates the receiver.
//! The only mutators are `put`, `push` and `remove`.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::DatasetError;

/// Key of a dataset entry: either an explicit name or an
/// auto-incrementing position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Index(u64),
    Name(String),
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{}", i),
            Key::Name(name) => write!(f, "{}", name),
        }
    }
}

impl From<u64> for Key {
    fn from(index: u64) -> Self {
        Key::Index(index)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index as u64)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

/// One entry of a dataset: a leaf value or a nested dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum Item<V> {
    Leaf(V),
    Nested(Dataset<V>),
}

impl<V> Item<V> {
    pub fn leaf(&self) -> Option<&V> {
        match self {
            Item::Leaf(v) => Some(v),
            Item::Nested(_) => None,
        }
    }

    pub fn nested(&self) -> Option<&Dataset<V>> {
        match self {
            Item::Leaf(_) => None,
            Item::Nested(ds) => Some(ds),
        }
    }
}

/// Comparison mode for [`Dataset::sort_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    /// Compare extracted keys as numbers.
    Numeric,
    /// Compare extracted keys as strings.
    Lexicographic,
    /// Generic three-way comparison across scalar kinds.
    Natural,
}

/// Leaf types that carry a record shape: anything with named fields that
/// `pluck`, `where_field` and friends can address.
pub trait Record {
    fn record_field(&self, name: &str) -> Option<Value>;
}

impl Record for Value {
    fn record_field(&self, name: &str) -> Option<Value> {
        self.as_object()
            .and_then(|map| map.get(name))
            .filter(|v| !v.is_null())
            .cloned()
    }
}

/// Truthiness used by the default `filter` predicate.
pub trait Truthy {
    fn is_truthy(&self) -> bool;
}

impl Truthy for bool {
    fn is_truthy(&self) -> bool {
        *self
    }
}

impl Truthy for String {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl Truthy for i64 {
    fn is_truthy(&self) -> bool {
        *self != 0
    }
}

impl Truthy for u64 {
    fn is_truthy(&self) -> bool {
        *self != 0
    }
}

impl Truthy for f64 {
    fn is_truthy(&self) -> bool {
        *self != 0.0
    }
}

impl Truthy for Value {
    fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        }
    }
}

impl<T: Truthy> Truthy for Option<T> {
    fn is_truthy(&self) -> bool {
        self.as_ref().map_or(false, Truthy::is_truthy)
    }
}

/// Ordered, recursively nestable collection.
#[derive(Debug, Clone)]
pub struct Dataset<V> {
    items: IndexMap<Key, Item<V>>,
    next_index: u64,
}

impl<V> Default for Dataset<V> {
    fn default() -> Self {
        Self {
            items: IndexMap::new(),
            next_index: 0,
        }
    }
}

impl<V: PartialEq> PartialEq for Dataset<V> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<V> Dataset<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn first(&self) -> Option<&Item<V>> {
        self.items.values().next()
    }

    pub fn get(&self, key: &Key) -> Option<&Item<V>> {
        self.items.get(key)
    }

    pub fn get_leaf(&self, key: &Key) -> Option<&V> {
        self.get(key).and_then(Item::leaf)
    }

    pub fn has(&self, key: &Key) -> bool {
        self.items.contains_key(key)
    }

    pub fn keys(&self) -> Vec<&Key> {
        self.items.keys().collect()
    }

    pub fn values(&self) -> Vec<&Item<V>> {
        self.items.values().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Item<V>)> {
        self.items.iter()
    }

    /// Iterates leaf values at this level only (nested datasets skipped).
    pub fn leaves(&self) -> impl Iterator<Item = &V> {
        self.items.values().filter_map(Item::leaf)
    }

    /// Adds or replaces the entry at `key`.
    pub fn put(&mut self, key: impl Into<Key>, value: V) -> &mut Self {
        self.insert_item(key.into(), Item::Leaf(value));
        self
    }

    /// Adds or replaces a nested dataset at `key`.
    pub fn put_nested(&mut self, key: impl Into<Key>, nested: Dataset<V>) -> &mut Self {
        self.insert_item(key.into(), Item::Nested(nested));
        self
    }

    /// Appends a leaf under the next auto-incrementing index.
    pub fn push(&mut self, value: V) -> &mut Self {
        let key = Key::Index(self.next_index);
        self.insert_item(key, Item::Leaf(value));
        self
    }

    pub fn remove(&mut self, key: &Key) -> Option<Item<V>> {
        self.items.shift_remove(key)
    }

    fn insert_item(&mut self, key: Key, item: Item<V>) {
        if let Key::Index(i) = key {
            if i >= self.next_index {
                self.next_index = i + 1;
            }
        }
        self.items.insert(key, item);
    }

    fn push_item(&mut self, item: Item<V>) {
        let key = Key::Index(self.next_index);
        self.insert_item(key, item);
    }

    /// Visits every leaf value, recursing into nested datasets.
    pub fn each(&self, f: impl Fn(&V, &Key)) {
        self.each_ref(&f);
    }

    fn each_ref<F: Fn(&V, &Key)>(&self, f: &F) {
        for (key, item) in &self.items {
            match item {
                Item::Leaf(v) => f(v, key),
                Item::Nested(ds) => ds.each_ref(f),
            }
        }
    }

    /// Applies `f` to every leaf value, rebuilding nested datasets in
    /// place. `f` never sees a container, only leaves.
    pub fn map<U>(&self, f: impl Fn(&V, &Key) -> U) -> Dataset<U> {
        self.map_ref(&f)
    }

    fn map_ref<U, F: Fn(&V, &Key) -> U>(&self, f: &F) -> Dataset<U> {
        let mut out = Dataset::new();
        for (key, item) in &self.items {
            let mapped = match item {
                Item::Leaf(v) => Item::Leaf(f(v, key)),
                Item::Nested(ds) => Item::Nested(ds.map_ref(f)),
            };
            out.insert_item(key.clone(), mapped);
        }
        out
    }

    /// Single-level left fold over `(key, item)` pairs in iteration
    /// order. Nested datasets are passed through as items, not recursed.
    pub fn reduce<T>(&self, f: impl Fn(T, &Key, &Item<V>) -> T, initial: T) -> T {
        let mut carry = initial;
        for (key, item) in &self.items {
            carry = f(carry, key, item);
        }
        carry
    }
}

impl<V: Clone> Dataset<V> {
    /// Keeps leaves matching the predicate. A nested dataset survives
    /// only if filtering it leaves something behind.
    pub fn filter(&self, pred: impl Fn(&V, &Key) -> bool) -> Dataset<V> {
        self.filter_ref(&pred)
    }

    fn filter_ref<F: Fn(&V, &Key) -> bool>(&self, pred: &F) -> Dataset<V> {
        let mut out = Dataset::new();
        for (key, item) in &self.items {
            match item {
                Item::Nested(ds) => {
                    let filtered = ds.filter_ref(pred);
                    if !filtered.is_empty() {
                        out.insert_item(key.clone(), Item::Nested(filtered));
                    }
                }
                Item::Leaf(v) => {
                    if pred(v, key) {
                        out.insert_item(key.clone(), Item::Leaf(v.clone()));
                    }
                }
            }
        }
        out
    }

    /// `filter` with the default predicate: keep truthy leaves.
    pub fn filter_default(&self) -> Dataset<V>
    where
        V: Truthy,
    {
        self.filter(|v, _| v.is_truthy())
    }

    /// Removes the given keys (non-recursive).
    pub fn except(&self, keys: &[Key]) -> Dataset<V> {
        let mut out = Dataset::new();
        for (key, item) in &self.items {
            if !keys.contains(key) {
                out.insert_item(key.clone(), item.clone());
            }
        }
        out
    }

    /// Returns a slice of the dataset, preserving keys (non-recursive).
    pub fn slice(&self, offset: usize, length: Option<usize>) -> Dataset<V> {
        let mut out = Dataset::new();
        let taken = length.unwrap_or(usize::MAX);
        for (key, item) in self.items.iter().skip(offset).take(taken) {
            out.insert_item(key.clone(), item.clone());
        }
        out
    }

    /// Single-level sort by a chain of key extractors; ties break on the
    /// next extractor. Entries are re-keyed sequentially. Nested datasets
    /// compare equal to everything and keep their relative position.
    pub fn sort_by(&self, extractors: &[&dyn Fn(&V) -> Value], mode: SortMode) -> Dataset<V> {
        let mut entries: Vec<Item<V>> = self.items.values().cloned().collect();
        entries.sort_by(|a, b| match (a, b) {
            (Item::Leaf(va), Item::Leaf(vb)) => {
                for extract in extractors {
                    let res = compare_values(&extract(va), &extract(vb), mode);
                    if res != std::cmp::Ordering::Equal {
                        return res;
                    }
                }
                std::cmp::Ordering::Equal
            }
            _ => std::cmp::Ordering::Equal,
        });
        let mut out = Dataset::new();
        for item in entries {
            out.push_item(item);
        }
        out
    }

    /// Sorts ascending by leaf value, preserving keys (non-recursive).
    pub fn sort_asc(&self, mode: SortMode) -> Dataset<V>
    where
        V: Serialize,
    {
        self.sort_entries(mode, false)
    }

    /// Sorts descending by leaf value, preserving keys (non-recursive).
    pub fn sort_desc(&self, mode: SortMode) -> Dataset<V>
    where
        V: Serialize,
    {
        self.sort_entries(mode, true)
    }

    fn sort_entries(&self, mode: SortMode, reverse: bool) -> Dataset<V>
    where
        V: Serialize,
    {
        let mut entries: Vec<(Key, Item<V>)> = self
            .items
            .iter()
            .map(|(k, i)| (k.clone(), i.clone()))
            .collect();
        entries.sort_by(|(_, a), (_, b)| {
            let ord = match (a, b) {
                (Item::Leaf(va), Item::Leaf(vb)) => {
                    compare_values(&leaf_value(va), &leaf_value(vb), mode)
                }
                _ => std::cmp::Ordering::Equal,
            };
            if reverse {
                ord.reverse()
            } else {
                ord
            }
        });
        let mut out = Dataset::new();
        for (key, item) in entries {
            out.insert_item(key, item);
        }
        out
    }

    /// Collects the value of `field` from every record-like leaf into a
    /// flat dataset, recursing through nested datasets.
    pub fn pluck(&self, field: &str) -> Dataset<Value>
    where
        V: Record,
    {
        let mut out = Dataset::new();
        self.pluck_into(field, &mut out, false);
        out
    }

    /// `pluck` suppressing duplicate values.
    pub fn pluck_unique(&self, field: &str) -> Dataset<Value>
    where
        V: Record,
    {
        let mut out = Dataset::new();
        self.pluck_into(field, &mut out, true);
        out
    }

    fn pluck_into(&self, field: &str, out: &mut Dataset<Value>, unique: bool)
    where
        V: Record,
    {
        for item in self.items.values() {
            match item {
                Item::Nested(ds) => ds.pluck_into(field, out, unique),
                Item::Leaf(v) => {
                    if let Some(value) = v.record_field(field) {
                        let duplicate = unique
                            && out
                                .items
                                .values()
                                .any(|i| matches!(i, Item::Leaf(existing) if *existing == value));
                        if !duplicate {
                            out.push(value);
                        }
                    }
                }
            }
        }
    }

    /// First leaf whose `field` equals `value`, searching recursively.
    pub fn first_where(&self, field: &str, value: &Value) -> Option<&V>
    where
        V: Record,
    {
        for item in self.items.values() {
            match item {
                Item::Nested(ds) => {
                    if let Some(found) = ds.first_where(field, value) {
                        return Some(found);
                    }
                }
                Item::Leaf(v) => {
                    if v.record_field(field).as_ref() == Some(value) {
                        return Some(v);
                    }
                }
            }
        }
        None
    }

    /// `filter` specialized to field equality.
    pub fn where_field(&self, field: &str, value: &Value) -> Dataset<V>
    where
        V: Record,
    {
        self.filter(|v, _| v.record_field(field).as_ref() == Some(value))
    }

    /// Whether the dataset contains `value`, by leaf equality or by a
    /// named field, searching recursively.
    pub fn contains(&self, value: &Value, field: Option<&str>) -> bool
    where
        V: Record + Serialize,
    {
        for item in self.items.values() {
            match item {
                Item::Nested(ds) => {
                    if ds.contains(value, field) {
                        return true;
                    }
                }
                Item::Leaf(v) => {
                    let matched = match field {
                        Some(name) => v.record_field(name).as_ref() == Some(value),
                        None => leaf_value(v) == *value,
                    };
                    if matched {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Flattens nested datasets up to `depth` levels (unbounded when
    /// `None`), using an explicit work stack rather than recursion.
    pub fn flatten(&self, depth: Option<usize>) -> Dataset<V> {
        let max_depth = depth.unwrap_or(usize::MAX);
        let mut out = Dataset::new();
        let mut stack: Vec<(std::vec::IntoIter<Item<V>>, usize)> = vec![(
            self.items.values().cloned().collect::<Vec<_>>().into_iter(),
            max_depth,
        )];
        while let Some((iter, remaining)) = stack.last_mut() {
            let remaining = *remaining;
            match iter.next() {
                Some(Item::Nested(ds)) if remaining > 1 => {
                    stack.push((
                        ds.items.into_values().collect::<Vec<_>>().into_iter(),
                        remaining - 1,
                    ));
                }
                Some(item) => out.push_item(item),
                None => {
                    stack.pop();
                }
            }
        }
        out
    }
}

impl<V: Serialize> Dataset<V> {
    /// Expands the dataset into a plain nested `serde_json::Value`.
    /// Sequential integer keys produce an array, anything else an
    /// ordered object. The data is always acyclic (it comes from parsed
    /// documents), so no cycle detection is needed.
    pub fn to_values(&self) -> Value {
        if self.is_sequential() {
            Value::Array(self.items.values().map(item_value).collect())
        } else {
            let mut map = serde_json::Map::new();
            for (key, item) in &self.items {
                map.insert(key.to_string(), item_value(item));
            }
            Value::Object(map)
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.to_values()).unwrap_or_else(|_| "null".to_string())
    }

    /// Joins every scalar leaf into a single comma-separated string,
    /// flattening recursively.
    pub fn to_display_string(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        self.collect_display(&mut parts);
        parts.join(", ")
    }

    fn collect_display(&self, parts: &mut Vec<String>) {
        for item in self.items.values() {
            match item {
                Item::Nested(ds) => ds.collect_display(parts),
                Item::Leaf(v) => match leaf_value(v) {
                    Value::Array(values) => {
                        for entry in values {
                            if !entry.is_array() && !entry.is_object() && !entry.is_null() {
                                parts.push(value_to_string(&entry));
                            }
                        }
                    }
                    Value::Object(_) => parts.push("object".to_string()),
                    Value::Null => {}
                    scalar => parts.push(value_to_string(&scalar)),
                },
            }
        }
    }

    fn is_sequential(&self) -> bool {
        self.items
            .keys()
            .enumerate()
            .all(|(i, k)| matches!(k, Key::Index(n) if *n == i as u64))
    }
}

impl Dataset<Value> {
    /// Builds a dataset from a raw JSON value. Arrays become indexed
    /// entries, objects keep their keys; anything else is rejected.
    pub fn from_value(value: Value) -> Result<Self, DatasetError> {
        match value {
            Value::Array(values) => {
                let mut out = Dataset::new();
                for v in values {
                    out.push(v);
                }
                Ok(out)
            }
            Value::Object(map) => {
                let mut out = Dataset::new();
                for (k, v) in map {
                    out.put(k, v);
                }
                Ok(out)
            }
            other => Err(DatasetError::InvalidItems {
                found: value_kind(&other),
            }),
        }
    }
}

impl<V> FromIterator<V> for Dataset<V> {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        let mut out = Dataset::new();
        for v in iter {
            out.push(v);
        }
        out
    }
}

impl<V> FromIterator<(Key, V)> for Dataset<V> {
    fn from_iter<I: IntoIterator<Item = (Key, V)>>(iter: I) -> Self {
        let mut out = Dataset::new();
        for (k, v) in iter {
            out.put(k, v);
        }
        out
    }
}

impl<V: Serialize> Serialize for Dataset<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_values().serialize(serializer)
    }
}

impl<'de, V: DeserializeOwned> Deserialize<'de> for Dataset<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_typed_value(value).map_err(serde::de::Error::custom)
    }
}

impl<V: DeserializeOwned> Dataset<V> {
    /// Rebuilds a dataset from its serialized form. A member that is
    /// itself a non-empty container of non-empty containers is treated
    /// as a nested dataset; everything else deserializes as a leaf.
    pub fn from_typed_value(value: Value) -> Result<Self, serde_json::Error> {
        let mut out = Dataset::new();
        match value {
            Value::Array(values) => {
                for v in values {
                    let item = Self::item_from_value(v)?;
                    out.push_item(item);
                }
            }
            Value::Object(map) => {
                for (k, v) in map {
                    let item = Self::item_from_value(v)?;
                    out.insert_item(Key::Name(k), item);
                }
            }
            other => {
                return Err(serde::de::Error::custom(format!(
                    "Dataset must deserialize from a map or an array, got {}",
                    value_kind(&other)
                )))
            }
        }
        Ok(out)
    }

    fn item_from_value(value: Value) -> Result<Item<V>, serde_json::Error> {
        if is_grouping_value(&value) {
            Ok(Item::Nested(Self::from_typed_value(value)?))
        } else {
            Ok(Item::Leaf(serde_json::from_value(value)?))
        }
    }
}

/// True when every member of a non-empty container is itself a non-empty
/// container. This mirrors the hydration grouping heuristic so that
/// serialized season -> episodes shapes round-trip as nested datasets.
pub(crate) fn is_grouping_value(value: &Value) -> bool {
    let members: Vec<&Value> = match value {
        Value::Array(a) if !a.is_empty() => a.iter().collect(),
        Value::Object(o) if !o.is_empty() => o.values().collect(),
        _ => return false,
    };
    members.iter().all(|m| match m {
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        _ => false,
    })
}

fn item_value<V: Serialize>(item: &Item<V>) -> Value {
    match item {
        Item::Leaf(v) => leaf_value(v),
        Item::Nested(ds) => ds.to_values(),
    }
}

fn leaf_value<V: Serialize>(v: &V) -> Value {
    serde_json::to_value(v).unwrap_or(Value::Null)
}

fn compare_values(a: &Value, b: &Value, mode: SortMode) -> std::cmp::Ordering {
    match mode {
        SortMode::Numeric => {
            let fa = a.as_f64().unwrap_or(0.0);
            let fb = b.as_f64().unwrap_or(0.0);
            fa.total_cmp(&fb)
        }
        SortMode::Lexicographic => value_to_string(a).cmp(&value_to_string(b)),
        SortMode::Natural => natural_cmp(a, b),
    }
}

fn natural_cmp(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or(0.0)
            .total_cmp(&y.as_f64().unwrap_or(0.0)),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => value_to_string(a).cmp(&value_to_string(b)),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
