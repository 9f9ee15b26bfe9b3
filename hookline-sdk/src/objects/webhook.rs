//! Registration objects for the management API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use time::OffsetDateTime;

use super::signal::Signal;

/// Create or replace a webhook registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub name: String,
    pub signal: Signal,
    /// Dotted reference of the watched model type.
    #[serde(rename = "ref")]
    pub type_ref: String,
    pub endpoint: String,
    /// Must be a JSON object; anything else is rejected at validation.
    #[serde(default = "empty_object")]
    pub headers: Value,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub keep_last_response: bool,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn default_enabled() -> bool {
    true
}

/// A stored registration as returned by the management API.
///
/// `auth_token` is masked when the server hides tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub id: i64,
    pub name: String,
    pub signal: Signal,
    #[serde(rename = "ref")]
    pub type_ref: String,
    pub endpoint: String,
    pub headers: Map<String, Value>,
    pub auth_token: String,
    pub enabled: bool,
    pub keep_last_response: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated: OffsetDateTime,
    pub last_response: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_success: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_failure: Option<OffsetDateTime>,
}

/// Field-level validation errors, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldErrors {
    pub errors: BTreeMap<String, Vec<String>>,
}
