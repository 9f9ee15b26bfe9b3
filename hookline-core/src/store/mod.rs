//! Registration persistence.
//!
//! The dispatcher only needs [`RegistrationStore::find_matching`] and
//! [`RegistrationStore::batch_update_outcome`]; the remaining operations back
//! the management API and registration validation.

mod memory;
mod postgres;

pub use memory::MemoryRegistrationStore;
pub use postgres::{
    BatchUpdateWebhookOutcome, DeleteWebhook, FindMatchingWebhooks, GetWebhookById, InsertWebhook,
    ListWebhooks, PgRegistrationStore, UpdateWebhook, WebhookExists, WebhookFields, WebhookKey,
    WebhookOutcome, WebhookRow,
};

use async_trait::async_trait;
use hookline_sdk::objects::{Signal, UnknownSignal};
use thiserror::Error;

use crate::cipher::CipherError;
use crate::entities::{NewRegistration, Registration};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("registration {0} not found")]
    NotFound(i64),

    /// A uniqueness constraint was violated.
    #[error("registration conflicts with an existing one ({0})")]
    Conflict(String),

    #[error("auth token: {0}")]
    Cipher(#[from] CipherError),

    #[error("stored signal is invalid: {0}")]
    InvalidSignal(#[from] UnknownSignal),
}

/// Extra constraints on the registration lookup, contributed by the filter
/// extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationFilter {
    NameEquals(String),
    NamePrefix(String),
    EndpointPrefix(String),
    KeepLastResponse(bool),
    IdIn(Vec<i64>),
}

impl RegistrationFilter {
    pub fn matches(&self, registration: &Registration) -> bool {
        match self {
            RegistrationFilter::NameEquals(name) => registration.name == *name,
            RegistrationFilter::NamePrefix(prefix) => registration.name.starts_with(prefix),
            RegistrationFilter::EndpointPrefix(prefix) => {
                registration.endpoint.starts_with(prefix)
            }
            RegistrationFilter::KeepLastResponse(keep) => {
                registration.keep_last_response == *keep
            }
            RegistrationFilter::IdIn(ids) => ids.contains(&registration.id),
        }
    }
}

#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Enabled registrations for `type_ref` whose signal is one of `signals`
    /// and which satisfy every filter, ordered by id.
    async fn find_matching(
        &self,
        type_ref: &str,
        signals: &[Signal],
        filters: &[RegistrationFilter],
    ) -> Result<Vec<Registration>, StoreError>;

    /// Write `last_success`, `last_failure` and `last_response` of every given
    /// registration in one operation. Other columns are left untouched.
    async fn batch_update_outcome(&self, registrations: &[Registration]) -> Result<(), StoreError>;

    async fn insert(&self, new: NewRegistration) -> Result<Registration, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<Registration>, StoreError>;

    async fn list(&self) -> Result<Vec<Registration>, StoreError>;

    /// Replace the writable fields of registration `id`.
    async fn update(&self, id: i64, new: NewRegistration) -> Result<Registration, StoreError>;

    /// Returns whether a row was removed.
    async fn delete(&self, id: i64) -> Result<bool, StoreError>;

    /// Whether another registration (not `exclude`) already uses `name`.
    async fn name_taken(&self, name: &str, exclude: Option<i64>) -> Result<bool, StoreError>;

    /// Whether another registration (not `exclude`) already targets
    /// `endpoint` for `type_ref`.
    async fn target_taken(
        &self,
        type_ref: &str,
        endpoint: &str,
        exclude: Option<i64>,
    ) -> Result<bool, StoreError>;
}
