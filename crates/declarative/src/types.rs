//! Core types for declarative resource reconciliation

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// Default delay between two async job status queries
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Target state of a resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    /// Resource should exist and match the declared fields
    #[default]
    Present,
    /// Resource should not exist
    Absent,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present => write!(f, "present"),
            Self::Absent => write!(f, "absent"),
        }
    }
}

/// A resource tag; identity is the exact (key, value) pair
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An opaque record returned by the remote API, keyed by its `id`
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    id: String,
    fields: Map<String, Value>,
}

impl ResourceDescriptor {
    /// Interpret an API record; it must be an object carrying an `id`
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(fields) = value else {
            return Err(Error::InvalidResponse(format!(
                "expected a resource record, got: {value}"
            )));
        };
        let id = match fields.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(Error::InvalidResponse(
                    "resource record without an id".to_string(),
                ));
            }
        };
        Ok(Self { id, fields })
    }

    /// Stable identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Raw field access
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Whether the record carries a field
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Field as text; numbers and booleans are rendered, null counts as missing
    pub fn get_str(&self, key: &str) -> Option<String> {
        value_as_text(self.fields.get(key)?)
    }

    /// Field as boolean (accepts `true`/`"true"`)
    pub fn get_bool(&self, key: &str) -> bool {
        match self.fields.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// Set or replace a field
    pub fn set(&mut self, key: &str, value: Value) {
        self.fields.insert(key.to_string(), value);
    }

    /// All fields, including `id`
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Whether this resource type carries a tag collection at all
    pub fn has_tags_field(&self) -> bool {
        self.fields.contains_key("tags")
    }

    /// Tags embedded in the record
    pub fn tags(&self) -> Vec<Tag> {
        self.fields
            .get("tags")
            .and_then(|v| serde_json::from_value::<Vec<Tag>>(v.clone()).ok())
            .unwrap_or_default()
    }

    /// Replace the embedded tag collection
    pub fn set_tags(&mut self, tags: &[Tag]) {
        let value = serde_json::to_value(tags).unwrap_or(Value::Array(Vec::new()));
        self.fields.insert("tags".to_string(), value);
    }
}

/// Render a JSON scalar as text
pub(crate) fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(value_as_text)
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(_) => Some(value.to_string()),
    }
}

/// Kinds of scope and auxiliary lookups a run can resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScopeKind {
    Domain,
    Account,
    Project,
    Zone,
    VirtualMachine,
    OsType,
    Hypervisor,
    IpAddress,
}

impl ScopeKind {
    /// Whether an unspecified identifier falls back to the first listed entity
    pub fn defaults_to_first(&self) -> bool {
        matches!(self, Self::Zone | Self::Hypervisor)
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Domain => "Domain",
            Self::Account => "Account",
            Self::Project => "Project",
            Self::Zone => "Zone",
            Self::VirtualMachine => "Virtual machine",
            Self::OsType => "OS type",
            Self::Hypervisor => "Hypervisor",
            Self::IpAddress => "IP address",
        };
        write!(f, "{name}")
    }
}

/// A resolved scope entity
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeReference {
    pub kind: ScopeKind,
    pub id: String,
    pub name: String,
    pub path: Option<String>,
    /// The full record the entity was resolved from
    pub record: Map<String, Value>,
}

/// Options for one reconciliation run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Compute `changed` without issuing mutating calls
    pub dry_run: bool,
    /// Poll asynchronous jobs until they finish
    pub wait_for_async: bool,
    /// Delay between two job status queries
    pub poll_interval: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            wait_for_async: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}
