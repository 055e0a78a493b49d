//! Change detection between desired fields and an observed record

use crate::params::{FieldValue, Params};
use crate::types::{ResourceDescriptor, value_as_text};
use log::debug;
use serde_json::Value;

/// Whether any desired field differs from the observed record.
///
/// Only fields present on both sides are compared. When `only_keys` is given,
/// every other desired field is ignored. Stops at the first mismatch.
pub fn has_changed(
    desired: &Params,
    observed: &ResourceDescriptor,
    only_keys: Option<&[&str]>,
) -> bool {
    for (key, want) in desired.iter() {
        if only_keys.is_some_and(|keys| !keys.contains(&key)) {
            continue;
        }
        if want.is_empty() {
            continue;
        }
        let Some(have) = observed.get(key) else {
            continue;
        };
        if !field_matches(want, have) {
            debug!("diff: {key} differs (want {}, have {have})", want.as_text());
            return true;
        }
    }
    false
}

fn field_matches(want: &FieldValue, have: &Value) -> bool {
    if let Some(want) = want.as_integer() {
        return observed_integer(have) == Some(want);
    }
    value_as_text(have).is_some_and(|have| have == want.as_text())
}

fn observed_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
