//! Request arguments and desired field sets
//!
//! [`Params`] is both the argument set of a remote call and the desired
//! state handed to the change detector. Absent or empty values never make it
//! into the map, so they are never sent and never compared.

use crate::types::Tag;
use std::collections::BTreeMap;

/// A single field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Free text (names, ids, algorithms, urls)
    Text(String),
    /// Numeric value (ports, sizes, bits)
    Integer(i64),
    /// Boolean switch
    Flag(bool),
    /// List sent as a comma-joined value (ids, cidrs)
    List(Vec<String>),
    /// List of maps sent as `name[i].key=value` pairs (tags)
    Records(Vec<BTreeMap<String, String>>),
}

impl FieldValue {
    /// Whether the value counts as "not supplied"
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Records(records) => records.is_empty(),
            Self::Integer(_) | Self::Flag(_) => false,
        }
    }

    /// Integer view, if this is a numeric value
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Text representation used for comparison and for the wire
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Flag(b) => b.to_string(),
            Self::List(items) => items.join(","),
            Self::Records(records) => records
                .iter()
                .map(|record| {
                    record
                        .iter()
                        .map(|(k, v)| format!("{k}={v}"))
                        .collect::<Vec<_>>()
                        .join(";")
                })
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    fn encode_into(&self, name: &str, out: &mut Vec<(String, String)>) {
        match self {
            Self::Records(records) => {
                for (i, record) in records.iter().enumerate() {
                    for (k, v) in record {
                        out.push((format!("{name}[{i}].{k}"), v.clone()));
                    }
                }
            }
            _ => out.push((name.to_string(), self.as_text())),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&String> for FieldValue {
    fn from(s: &String) -> Self {
        Self::Text(s.clone())
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<u16> for FieldValue {
    fn from(i: u16) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<u32> for FieldValue {
    fn from(i: u32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Flag(b)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

impl From<&[String]> for FieldValue {
    fn from(items: &[String]) -> Self {
        Self::List(items.to_vec())
    }
}

impl From<&[Tag]> for FieldValue {
    fn from(tags: &[Tag]) -> Self {
        Self::Records(
            tags.iter()
                .map(|t| {
                    BTreeMap::from([
                        ("key".to_string(), t.key.clone()),
                        ("value".to_string(), t.value.clone()),
                    ])
                })
                .collect(),
        )
    }
}

/// Named field values, ordered by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    fields: BTreeMap<String, FieldValue>,
}

/// The desired field set of one resource
pub type DesiredState = Params;

impl Params {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Params::set`]
    pub fn with(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Builder form of [`Params::set_opt`]
    pub fn with_opt<V: Into<FieldValue>>(mut self, key: &str, value: Option<V>) -> Self {
        self.set_opt(key, value);
        self
    }

    /// Set a field; empty values remove it instead
    pub fn set(&mut self, key: &str, value: impl Into<FieldValue>) {
        let value = value.into();
        if value.is_empty() {
            self.fields.remove(key);
        } else {
            self.fields.insert(key.to_string(), value);
        }
    }

    /// Set a field only when a value is present
    pub fn set_opt<V: Into<FieldValue>>(&mut self, key: &str, value: Option<V>) {
        match value {
            Some(v) => self.set(key, v),
            None => {
                self.fields.remove(key);
            }
        }
    }

    /// Get a field
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Get a field as text
    pub fn get_text(&self, key: &str) -> Option<String> {
        self.fields.get(key).map(FieldValue::as_text)
    }

    /// Whether a field is set
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Iterate fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field is set
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Add every field of `other`, overriding on conflict
    pub fn merge(mut self, other: Params) -> Self {
        self.fields.extend(other.fields);
        self
    }

    /// Flatten into wire pairs
    pub fn encode(&self) -> Vec<(String, String)> {
        let mut out = Vec::with_capacity(self.fields.len());
        for (name, value) in &self.fields {
            value.encode_into(name, &mut out);
        }
        out
    }
}
