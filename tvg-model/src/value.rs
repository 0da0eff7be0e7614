use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;
use tracing::warn;

use crate::error::{ValidationError, ValidationResult};

/// A dynamically-typed staging value.
///
/// Searches only ever carry the scalar variants. `Nested` appears under
/// `fields`, where it points at a row of another table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Bool(bool),
    String(String),
    Nested(NestedSearch),
}

impl FieldValue {
    /// True for numbers, booleans and strings.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::Nested(_))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Bool(_) => "bool",
            Self::String(_) => "string",
            Self::Nested(_) => "nested search",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_nested(&self) -> Option<&NestedSearch> {
        match self {
            Self::Nested(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // f64's Display drops the fraction of integral values: 1.0 -> "1".
            // It never switches to exponent form, so 1e21 prints all 22 digits.
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::String(s) => f.write_str(s),
            Self::Nested(n) => write!(f, "{n}"),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<NestedSearch> for FieldValue {
    fn from(n: NestedSearch) -> Self {
        Self::Nested(n)
    }
}

/// Mapping from field name to value.
///
/// Keys are kept sorted, so iteration order never depends on insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldMap(BTreeMap<String, FieldValue>);

impl FieldMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in ascending key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, FieldValue> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Same key set and pairwise equal values. No type coercion: `1` and
    /// `"1"` differ.
    pub fn equal(&self, other: &FieldMap) -> bool {
        self.len() == other.len() && self.exist_in(other)
    }

    /// Every entry of `self` is present in `other` with an equal value.
    pub fn exist_in(&self, other: &FieldMap) -> bool {
        self.0
            .iter()
            .all(|(k, v)| other.get(k).is_some_and(|o| o == v))
    }

    /// Decodes a JSON object whose values may only be scalars.
    pub(crate) fn decode_search(map: &Map<String, Value>) -> ValidationResult<Self> {
        let mut out = Self::new();
        for (key, value) in sorted_entries(map) {
            out.0.insert(key.clone(), decode_search_value(key, value)?);
        }
        Ok(out)
    }

    /// Decodes a JSON object of staged fields in key order.
    ///
    /// Decoding is strict up to and including the first nested search.
    /// Later entries go through [`extend_unchecked`](Self::extend_unchecked).
    pub(crate) fn decode_fields(map: &Map<String, Value>) -> ValidationResult<Self> {
        let mut out = Self::new();
        let mut entries = sorted_entries(map).into_iter();
        for (key, value) in entries.by_ref() {
            let decoded = decode_field_value(key, value)?;
            let nested = !decoded.is_scalar();
            out.0.insert(key.clone(), decoded);
            if nested {
                break;
            }
        }
        out.extend_unchecked(entries);
        Ok(out)
    }

    /// Adds entries that follow the deciding nested search. They are never
    /// checked, so values the model cannot hold are dropped instead of
    /// failing the record.
    pub(crate) fn extend_unchecked<'v>(
        &mut self,
        entries: impl IntoIterator<Item = (&'v String, &'v Value)>,
    ) {
        for (key, value) in entries {
            match decode_field_value(key, value) {
                Ok(decoded) => {
                    self.0.insert(key.clone(), decoded);
                }
                Err(e) => warn!(field = %key, error = %e, "Dropping unchecked field value"),
            }
        }
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<'a> IntoIterator for &'a FieldMap {
    type Item = (&'a String, &'a FieldValue);
    type IntoIter = btree_map::Iter<'a, String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A sub-search embedded as a field value: "the row of `table` matching
/// `search_by`".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedSearch {
    pub table: String,
    pub search_by: FieldMap,
}

impl NestedSearch {
    pub fn new(table: impl Into<String>, search_by: FieldMap) -> Self {
        Self {
            table: table.into(),
            search_by,
        }
    }

    /// Recognizes `{ "table": <string>, "searchBy": <object> }`. Other keys
    /// are ignored.
    pub(crate) fn parse_shape<'v>(
        key: &str,
        obj: &'v Map<String, Value>,
    ) -> ValidationResult<(&'v str, &'v Map<String, Value>)> {
        let shape_error = || ValidationError::InvalidNestedSearchShape {
            key: key.to_owned(),
            value: Value::Object(obj.clone()).to_string(),
        };

        let table = obj.get("table").and_then(Value::as_str).ok_or_else(shape_error)?;
        let search_by = obj
            .get("searchBy")
            .and_then(Value::as_object)
            .ok_or_else(shape_error)?;
        Ok((table, search_by))
    }

    fn decode(key: &str, obj: &Map<String, Value>) -> ValidationResult<Self> {
        let (table, search_by) = Self::parse_shape(key, obj)?;
        Ok(Self {
            table: table.to_owned(),
            search_by: FieldMap::decode_search(search_by).map_err(|source| {
                ValidationError::Nested {
                    field: key.to_owned(),
                    source: Box::new(source),
                }
            })?,
        })
    }
}

impl fmt::Display for NestedSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.table)?;
        for (i, (k, v)) in self.search_by.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        f.write_str(")")
    }
}

/// Entries of a JSON object in ascending key order, whatever order the map
/// keeps them in.
pub(crate) fn sorted_entries(map: &Map<String, Value>) -> Vec<(&String, &Value)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
    entries
}

pub(crate) fn decode_search_value(key: &str, value: &Value) -> ValidationResult<FieldValue> {
    decode_scalar(value).ok_or_else(|| ValidationError::InvalidSearchValueType {
        key: key.to_owned(),
        value: value.to_string(),
    })
}

/// Decodes one staged field. Objects must be nested-search descriptors.
pub(crate) fn decode_field_value(key: &str, value: &Value) -> ValidationResult<FieldValue> {
    match value {
        Value::Object(obj) => Ok(FieldValue::Nested(NestedSearch::decode(key, obj)?)),
        other => decode_scalar(other).ok_or_else(|| ValidationError::InvalidFieldValueType {
            key: key.to_owned(),
            value: other.to_string(),
        }),
    }
}

fn decode_scalar(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Bool(b) => Some(FieldValue::Bool(*b)),
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).map(FieldValue::Number),
        Value::String(s) => Some(FieldValue::String(s.clone())),
        _ => None,
    }
}
