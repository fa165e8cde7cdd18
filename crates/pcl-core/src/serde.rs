//! Canonical JSON helpers shared by every crate that persists artefacts.

use std::collections::BTreeMap;
use std::iter::FromIterator;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::PclError;

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect::<BTreeMap<_, _>>();
            Value::Object(Map::from_iter(ordered))
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serializes a value into canonical JSON bytes with deterministic key ordering.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, PclError> {
    let value = serde_json::to_value(value).map_err(|err| PclError::serde("json_serialize", err))?;
    let canonical = canonicalize(value);
    let mut bytes = Vec::new();
    serde_json::to_writer(&mut bytes, &canonical)
        .map_err(|err| PclError::serde("json_write", err))?;
    Ok(bytes)
}
