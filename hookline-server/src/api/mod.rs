//! HTTP API handlers.
//!
//! # Endpoints
//!
//! - `GET    /webhooks`       - list registrations
//! - `POST   /webhooks`       - create a registration
//! - `GET    /webhooks/{id}`  - fetch one registration
//! - `PUT    /webhooks/{id}`  - replace a registration
//! - `DELETE /webhooks/{id}`  - remove a registration
//! - `POST   /events`         - ingest a record lifecycle event

pub mod events;
pub mod webhooks;

use axum::{Json, Router, http::StatusCode, response::IntoResponse};
use hookline_core::store::StoreError;
use hookline_core::validation::{RegistrationError, ValidationErrors};
use hookline_sdk::objects::FieldErrors;

use crate::state::AppState;

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(webhooks::router())
        .merge(events::router())
}

/// Errors that can occur in API handlers.
#[derive(Debug)]
pub enum ApiError {
    /// The request failed validation.
    Invalid(FieldErrors),
    /// The requested registration was not found.
    NotFound,
    /// The store failed.
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => ApiError::NotFound,
            // Lost a race with a concurrent write after validation passed.
            StoreError::Conflict(constraint) => {
                let mut errors = ValidationErrors::default();
                if constraint == "webhooks_name_key" {
                    errors.add("name", "Webhook with this name already exists.");
                } else {
                    errors.add(
                        "endpoint",
                        "Webhook with this referenced model and endpoint already exists.",
                    );
                }
                ApiError::Invalid(errors.into())
            }
            // The stored token cannot be read with the configured key.
            StoreError::Cipher(e) => {
                let mut errors = ValidationErrors::default();
                errors.add("auth_token", e.to_string());
                ApiError::Invalid(errors.into())
            }
            other => ApiError::Store(other),
        }
    }
}

impl From<RegistrationError> for ApiError {
    fn from(e: RegistrationError) -> Self {
        match e {
            RegistrationError::Invalid(errors) => ApiError::Invalid(errors.into()),
            RegistrationError::Store(e) => e.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::Invalid(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "webhook not found").into_response(),
            ApiError::Store(e) => {
                tracing::error!(error = %e, "Registration store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
        }
    }
}
