//! Shared adapter contract, the confidence-normalisation helper every adapter
//! uses, and tolerant snake_case/camelCase JSON field lookup.

use idp_core::CanonicalDocument;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{0}")]
    InvalidPayload(String),
    #[error("no adapter registered for parser '{0}'")]
    UnknownParser(String),
    #[error("confidence value must be numeric, got: {0}")]
    InvalidConfidence(String),
}

/// Transforms a raw vendor payload into the canonical schema. Implementations
/// must be pure: no mutation of `payload`, no I/O, no hidden state.
pub trait ParserAdapter: Send + Sync {
    fn transform(
        &self,
        payload: &Value,
        document_id: &str,
        source_uri: &str,
        checksum: &str,
        metadata: &HashMap<String, Value>,
    ) -> Result<CanonicalDocument, AdapterError>;
}

/// Coerces an optional confidence value to `[0, f64::MAX]`, defaulting to `1.0`
/// when absent. Numeric-looking strings are accepted; anything else is an error.
pub fn normalise_confidence(value: Option<&Value>) -> Result<f64, AdapterError> {
    match value {
        None | Some(Value::Null) => Ok(1.0),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| AdapterError::InvalidConfidence(n.to_string())),
        Some(Value::String(s)) => s
            .parse::<f64>()
            .map_err(|_| AdapterError::InvalidConfidence(s.clone())),
        Some(other) => Err(AdapterError::InvalidConfidence(other.to_string())),
    }
}

/// Converts `snake_case` to `camelCase`.
#[must_use]
pub fn snake_to_camel(name: &str) -> String {
    let mut parts = name.split('_');
    let Some(first) = parts.next() else {
        return name.to_string();
    };
    let mut out = first.to_string();
    for part in parts {
        let mut chars = part.chars();
        if let Some(c) = chars.next() {
            out.push(c.to_ascii_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

/// Converts `camelCase` to `snake_case`.
#[must_use]
pub fn camel_to_snake(name: &str) -> String {
    let mut out = String::new();
    for c in name.chars() {
        if c.is_uppercase() {
            out.push('_');
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out.trim_start_matches('_').to_string()
}

/// Looks up `key` on a JSON object, then its snake_case form, then its
/// camelCase form, returning the first present value.
#[must_use]
pub fn get_field<'a>(obj: &'a Value, key: &str) -> Option<&'a Value> {
    let map = obj.as_object()?;
    if let Some(v) = map.get(key) {
        return Some(v);
    }
    let snake = camel_to_snake(key);
    if let Some(v) = map.get(&snake) {
        return Some(v);
    }
    let camel = snake_to_camel(key);
    map.get(&camel)
}

/// Like [`get_field`] but returns an empty slice instead of `None` when the
/// field is absent or not an array, and tolerates a bare value by ignoring it.
#[must_use]
pub fn get_array<'a>(obj: &'a Value, key: &str) -> &'a [Value] {
    static EMPTY: [Value; 0] = [];
    get_field(obj, key).and_then(Value::as_array).map_or(&EMPTY, Vec::as_slice)
}

#[must_use]
pub fn get_str<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
    get_field(obj, key).and_then(Value::as_str)
}

#[must_use]
pub fn get_u32(obj: &Value, key: &str, default: u32) -> u32 {
    get_field(obj, key)
        .and_then(Value::as_u64)
        .map_or(default, |v| v as u32)
}

#[must_use]
pub fn get_f64_list(obj: &Value, key: &str) -> Option<Vec<f64>> {
    get_field(obj, key)?.as_array().map(|arr| {
        arr.iter()
            .filter_map(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .collect()
    })
}
