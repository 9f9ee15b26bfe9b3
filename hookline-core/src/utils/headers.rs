//! Case-insensitive helpers for outbound header maps.

use serde_json::Value;
use std::collections::BTreeMap;

pub type Headers = BTreeMap<String, String>;

pub fn contains_header(headers: &Headers, name: &str) -> bool {
    headers.keys().any(|key| key.eq_ignore_ascii_case(name))
}

/// Insert `name: value` unless a header with that name already exists.
pub fn set_default_header(headers: &mut Headers, name: &str, value: impl Into<String>) {
    if !contains_header(headers, name) {
        headers.insert(name.to_string(), value.into());
    }
}

/// Insert `name: value`, replacing any existing header of that name.
pub fn set_header(headers: &mut Headers, name: &str, value: impl Into<String>) {
    headers.retain(|key, _| !key.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value.into());
}

/// Render a stored JSON header value as header text.
pub fn header_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
