//! Output record of a run

use crate::types::{ResourceDescriptor, Tag};
use serde::Serialize;
use serde_json::{Map, Value};

/// How a returned field is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coerce {
    AsIs,
    /// The API sometimes returns numbers as text
    Integer,
}

/// Copy `source` from the resource record into the output as `target`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapping {
    pub source: &'static str,
    pub target: &'static str,
    pub coerce: Coerce,
}

impl FieldMapping {
    pub const fn new(source: &'static str, target: &'static str) -> Self {
        Self {
            source,
            target,
            coerce: Coerce::AsIs,
        }
    }

    pub const fn integer(source: &'static str, target: &'static str) -> Self {
        Self {
            source,
            target,
            coerce: Coerce::Integer,
        }
    }
}

/// Fields every resource type reports
pub const COMMON_RETURNS: &[FieldMapping] = &[
    FieldMapping::new("id", "id"),
    FieldMapping::new("name", "name"),
    FieldMapping::new("created", "created"),
    FieldMapping::new("zonename", "zone"),
    FieldMapping::new("state", "state"),
    FieldMapping::new("project", "project"),
    FieldMapping::new("account", "account"),
    FieldMapping::new("domain", "domain"),
    FieldMapping::new("displaytext", "display_text"),
    FieldMapping::new("displayname", "display_name"),
    FieldMapping::new("description", "description"),
];

/// Result of one reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub changed: bool,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
}

impl RunReport {
    /// Report for a run that produced no resource record
    pub fn empty(changed: bool) -> Self {
        Self {
            changed,
            ..Default::default()
        }
    }

    /// Build the report from a resource record and the type's own mappings
    pub fn from_resource(
        changed: bool,
        resource: &ResourceDescriptor,
        returns: &[FieldMapping],
    ) -> Self {
        let mut fields = Map::new();
        for mapping in COMMON_RETURNS.iter().chain(returns) {
            let Some(value) = resource.get(mapping.source) else {
                continue;
            };
            let value = match mapping.coerce {
                Coerce::AsIs => value.clone(),
                Coerce::Integer => match coerce_integer(value) {
                    Some(i) => Value::from(i),
                    None => continue,
                },
            };
            fields.insert(mapping.target.to_string(), value);
        }
        let tags = resource.has_tags_field().then(|| resource.tags());
        Self {
            changed,
            fields,
            tags,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_common_and_specific_fields() {
        let rule = ResourceDescriptor::from_value(json!({
            "id": "lb1",
            "name": "rule1",
            "zonename": "ch-gva-2",
            "publicport": "80",
            "privateport": 8080,
            "publicip": "1.2.3.4",
            "tags": [{"key": "env", "value": "prod"}],
            "unmapped": true
        }))
        .unwrap();
        let returns = [
            FieldMapping::new("publicip", "public_ip"),
            FieldMapping::integer("publicport", "public_port"),
            FieldMapping::integer("privateport", "private_port"),
        ];

        let report = RunReport::from_resource(true, &rule, &returns);
        assert_eq!(report.get("zone"), Some(&json!("ch-gva-2")));
        assert_eq!(report.get("public_port"), Some(&json!(80)));
        assert_eq!(report.get("private_port"), Some(&json!(8080)));
        assert!(report.get("unmapped").is_none());

        let out = serde_json::to_value(&report).unwrap();
        assert_eq!(out["changed"], json!(true));
        assert_eq!(out["public_ip"], json!("1.2.3.4"));
        assert_eq!(out["tags"], json!([{"key": "env", "value": "prod"}]));
    }

    #[test]
    fn test_empty_report_has_no_tags() {
        let out = serde_json::to_value(RunReport::empty(false)).unwrap();
        assert_eq!(out, json!({"changed": false}));
    }
}
