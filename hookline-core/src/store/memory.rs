use async_trait::async_trait;
use hookline_sdk::objects::Signal;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use super::{RegistrationFilter, RegistrationStore, StoreError};
use crate::entities::{NewRegistration, Registration};

/// Process-local registration store.
///
/// Tokens are kept in plaintext. Uniqueness of `name` and of
/// `(type_ref, endpoint)` is enforced like the database constraints.
#[derive(Debug, Default)]
pub struct MemoryRegistrationStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    next_id: i64,
    rows: Vec<Registration>,
    outcome_writes: usize,
}

impl MemoryRegistrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `batch_update_outcome` calls so far.
    pub async fn outcome_writes(&self) -> usize {
        self.inner.lock().await.outcome_writes
    }
}

impl MemoryInner {
    fn check_unique(&self, new: &NewRegistration, exclude: Option<i64>) -> Result<(), StoreError> {
        let others = self.rows.iter().filter(|row| Some(row.id) != exclude);
        for row in others {
            if row.name == new.name {
                return Err(StoreError::Conflict("webhooks_name_key".to_string()));
            }
            if row.type_ref == new.type_ref && row.endpoint == new.endpoint {
                return Err(StoreError::Conflict("prevent_duplicate_hooks".to_string()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RegistrationStore for MemoryRegistrationStore {
    async fn find_matching(
        &self,
        type_ref: &str,
        signals: &[Signal],
        filters: &[RegistrationFilter],
    ) -> Result<Vec<Registration>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .rows
            .iter()
            .filter(|row| row.enabled && row.type_ref == type_ref)
            .filter(|row| signals.contains(&row.signal))
            .filter(|row| filters.iter().all(|filter| filter.matches(row)))
            .cloned()
            .collect())
    }

    async fn batch_update_outcome(&self, registrations: &[Registration]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.outcome_writes += 1;
        for outcome in registrations {
            if let Some(row) = inner.rows.iter_mut().find(|row| row.id == outcome.id) {
                row.last_success = outcome.last_success;
                row.last_failure = outcome.last_failure;
                row.last_response = outcome.last_response.clone();
            }
        }
        Ok(())
    }

    async fn insert(&self, new: NewRegistration) -> Result<Registration, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.check_unique(&new, None)?;
        inner.next_id += 1;
        let registration = Registration::from_new(inner.next_id, new, OffsetDateTime::now_utc());
        inner.rows.push(registration.clone());
        Ok(registration)
    }

    async fn get(&self, id: i64) -> Result<Option<Registration>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.rows.iter().find(|row| row.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Registration>, StoreError> {
        Ok(self.inner.lock().await.rows.clone())
    }

    async fn update(&self, id: i64, new: NewRegistration) -> Result<Registration, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.check_unique(&new, Some(id))?;
        let row = inner
            .rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(StoreError::NotFound(id))?;
        row.apply(new, OffsetDateTime::now_utc());
        Ok(row.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        let before = inner.rows.len();
        inner.rows.retain(|row| row.id != id);
        Ok(inner.rows.len() != before)
    }

    async fn name_taken(&self, name: &str, exclude: Option<i64>) -> Result<bool, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .rows
            .iter()
            .any(|row| row.name == name && Some(row.id) != exclude))
    }

    async fn target_taken(
        &self,
        type_ref: &str,
        endpoint: &str,
        exclude: Option<i64>,
    ) -> Result<bool, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.rows.iter().any(|row| {
            row.type_ref == type_ref && row.endpoint == endpoint && Some(row.id) != exclude
        }))
    }
}
