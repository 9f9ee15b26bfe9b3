//! Write-time validation of registrations.
//!
//! Errors are collected per field so the management surface can show all of
//! them at once. The dispatcher never goes through here; it only writes
//! outcome columns.

use hookline_sdk::config::MAX_COL_SIZE;
use hookline_sdk::objects::FieldErrors;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::config::Settings;
use crate::entities::NewRegistration;
use crate::store::{RegistrationStore, StoreError};

pub const MAX_NAME_LENGTH: usize = 256;
pub const MAX_REF_LENGTH: usize = 1024;
pub const MAX_ENDPOINT_LENGTH: usize = 2048;

/// Messages keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or_default()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.fields {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        FieldErrors {
            errors: errors.fields,
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("invalid registration: {0}")]
    Invalid(ValidationErrors),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Check that `type_ref` names a known model type that may have webhooks.
pub fn validate_type_ref(type_ref: &str, settings: &Settings) -> Result<(), String> {
    let looks_like_path = type_ref
        .rsplit_once('.')
        .is_some_and(|(module, name)| {
            !name.is_empty() && module.split('.').all(|part| !part.is_empty())
        });
    if !looks_like_path {
        return Err(format!(
            "Could not import '{type_ref}'. '{type_ref}' doesn't look like a module path."
        ));
    }
    if !settings.models.contains(type_ref) {
        return Err(format!(
            "Could not import '{type_ref}'. No model named '{type_ref}' is registered."
        ));
    }
    if !settings.allows_registrations(type_ref) {
        return Err(format!("Webhooks not defined for '{type_ref}'."));
    }
    Ok(())
}

fn check_length(errors: &mut ValidationErrors, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.add(
            field,
            format!("Ensure this field has no more than {max} characters."),
        );
    }
}

/// Validate a registration about to be stored.
///
/// `existing` is the id being replaced on update, so the registration does
/// not collide with itself.
pub async fn validate_registration(
    new: &NewRegistration,
    existing: Option<i64>,
    settings: &Settings,
    store: &dyn RegistrationStore,
) -> Result<(), RegistrationError> {
    let mut errors = ValidationErrors::default();

    if new.name.trim().is_empty() {
        errors.add("name", "This field may not be blank.");
    }
    check_length(&mut errors, "name", &new.name, MAX_NAME_LENGTH);

    check_length(&mut errors, "ref", &new.type_ref, MAX_REF_LENGTH);
    if !errors.has("ref") {
        if let Err(message) = validate_type_ref(&new.type_ref, settings) {
            errors.add("ref", message);
        }
    }

    check_length(&mut errors, "endpoint", &new.endpoint, MAX_ENDPOINT_LENGTH);
    match url::Url::parse(&new.endpoint) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
        _ => errors.add("endpoint", "Enter a valid URL."),
    }

    if !matches!(new.headers, Value::Object(_)) {
        errors.add("headers", "Headers must be a JSON object.");
    }

    if !new.auth_token.is_empty() {
        check_length(&mut errors, "auth_token", &new.auth_token, MAX_COL_SIZE);
        if let Err(e) = settings.cipher() {
            errors.add("auth_token", e.to_string());
        }
    }

    if !errors.has("name") && store.name_taken(&new.name, existing).await? {
        errors.add("name", "Webhook with this name already exists.");
    }
    if !errors.has("ref")
        && !errors.has("endpoint")
        && store
            .target_taken(&new.type_ref, &new.endpoint, existing)
            .await?
    {
        errors.add(
            "endpoint",
            "Webhook with this referenced model and endpoint already exists.",
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(RegistrationError::Invalid(errors))
    }
}
