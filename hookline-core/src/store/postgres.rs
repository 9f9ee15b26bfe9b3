use async_trait::async_trait;
use hookline_sdk::objects::Signal;
use kanau::processor::Processor;
use serde_json::{Map, Value};
use sqlx::types::Json;
use time::OffsetDateTime;

use super::{RegistrationFilter, RegistrationStore, StoreError};
use crate::config::{ConfigStore, Settings};
use crate::entities::{NewRegistration, Registration};
use crate::framework::DatabaseProcessor;

const WEBHOOK_COLUMNS: &str = "id, name, signal, ref, endpoint, headers, auth_token, enabled, \
     keep_last_response, created, updated, last_response, last_success, last_failure";

/// A row of the `webhooks` table. `auth_token` is ciphertext.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WebhookRow {
    pub id: i64,
    pub name: String,
    pub signal: String,
    #[sqlx(rename = "ref")]
    pub type_ref: String,
    pub endpoint: String,
    pub headers: Json<Map<String, Value>>,
    pub auth_token: String,
    pub enabled: bool,
    pub keep_last_response: bool,
    pub created: OffsetDateTime,
    pub updated: OffsetDateTime,
    pub last_response: String,
    pub last_success: Option<OffsetDateTime>,
    pub last_failure: Option<OffsetDateTime>,
}

impl WebhookRow {
    fn into_registration(self, settings: &Settings) -> Result<Registration, StoreError> {
        let auth_token = if self.auth_token.is_empty() {
            String::new()
        } else {
            settings.cipher()?.decrypt(&self.auth_token)?
        };
        Ok(Registration {
            id: self.id,
            name: self.name,
            signal: self.signal.parse()?,
            type_ref: self.type_ref,
            endpoint: self.endpoint,
            headers: self.headers.0,
            auth_token,
            enabled: self.enabled,
            keep_last_response: self.keep_last_response,
            created: self.created,
            updated: self.updated,
            last_response: self.last_response,
            last_success: self.last_success,
            last_failure: self.last_failure,
        })
    }
}

/// Writable columns with the token already encrypted.
#[derive(Debug, Clone)]
pub struct WebhookFields {
    pub name: String,
    pub signal: String,
    pub type_ref: String,
    pub endpoint: String,
    pub headers: Map<String, Value>,
    pub auth_token: String,
    pub enabled: bool,
    pub keep_last_response: bool,
}

impl WebhookFields {
    fn seal(new: NewRegistration, settings: &Settings) -> Result<Self, StoreError> {
        let auth_token = if new.auth_token.is_empty() {
            String::new()
        } else {
            settings.cipher()?.encrypt(&new.auth_token)?
        };
        Ok(Self {
            name: new.name,
            signal: new.signal.as_str().to_string(),
            type_ref: new.type_ref,
            endpoint: new.endpoint,
            headers: match new.headers {
                Value::Object(map) => map,
                _ => Map::new(),
            },
            auth_token,
            enabled: new.enabled,
            keep_last_response: new.keep_last_response,
        })
    }
}

#[derive(Debug, Clone)]
/// Enabled webhooks for a model type whose signal is in `signals`.
pub struct FindMatchingWebhooks {
    pub type_ref: String,
    pub signals: Vec<String>,
    pub filters: Vec<RegistrationFilter>,
}

impl Processor<FindMatchingWebhooks> for DatabaseProcessor {
    type Output = Vec<WebhookRow>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:FindMatchingWebhooks")]
    async fn process(&self, query: FindMatchingWebhooks) -> Result<Vec<WebhookRow>, sqlx::Error> {
        let mut query_builder = sqlx::QueryBuilder::new("SELECT ");
        query_builder.push(WEBHOOK_COLUMNS);
        query_builder.push(" FROM webhooks WHERE enabled = TRUE AND ref = ");
        query_builder.push_bind(query.type_ref);
        query_builder.push(" AND signal = ANY(");
        query_builder.push_bind(query.signals);
        query_builder.push(")");

        for filter in query.filters {
            match filter {
                RegistrationFilter::NameEquals(name) => {
                    query_builder.push(" AND name = ").push_bind(name);
                }
                RegistrationFilter::NamePrefix(prefix) => {
                    query_builder
                        .push(" AND starts_with(name, ")
                        .push_bind(prefix)
                        .push(")");
                }
                RegistrationFilter::EndpointPrefix(prefix) => {
                    query_builder
                        .push(" AND starts_with(endpoint, ")
                        .push_bind(prefix)
                        .push(")");
                }
                RegistrationFilter::KeepLastResponse(keep) => {
                    query_builder
                        .push(" AND keep_last_response = ")
                        .push_bind(keep);
                }
                RegistrationFilter::IdIn(ids) => {
                    query_builder.push(" AND id = ANY(").push_bind(ids).push(")");
                }
            }
        }
        query_builder.push(" ORDER BY id");

        query_builder
            .build_query_as::<WebhookRow>()
            .fetch_all(&self.pool)
            .await
    }
}

/// Outcome columns of one webhook after a dispatch.
#[derive(Debug, Clone)]
pub struct WebhookOutcome {
    pub id: i64,
    pub last_success: Option<OffsetDateTime>,
    pub last_failure: Option<OffsetDateTime>,
    pub last_response: String,
}

#[derive(Debug, Clone)]
/// Write the outcome columns of many webhooks in a single query.
pub struct BatchUpdateWebhookOutcome {
    pub outcomes: Vec<WebhookOutcome>,
}

impl Processor<BatchUpdateWebhookOutcome> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:BatchUpdateWebhookOutcome")]
    async fn process(&self, cmd: BatchUpdateWebhookOutcome) -> Result<u64, sqlx::Error> {
        if cmd.outcomes.is_empty() {
            return Ok(0);
        }

        let mut ids = Vec::with_capacity(cmd.outcomes.len());
        let mut successes = Vec::with_capacity(cmd.outcomes.len());
        let mut failures = Vec::with_capacity(cmd.outcomes.len());
        let mut responses = Vec::with_capacity(cmd.outcomes.len());
        for outcome in cmd.outcomes {
            ids.push(outcome.id);
            successes.push(outcome.last_success);
            failures.push(outcome.last_failure);
            responses.push(outcome.last_response);
        }

        let result = sqlx::query(
            r#"
            UPDATE webhooks AS w
            SET last_success = u.last_success,
                last_failure = u.last_failure,
                last_response = u.last_response
            FROM UNNEST($1::bigint[], $2::timestamptz[], $3::timestamptz[], $4::text[])
                AS u(id, last_success, last_failure, last_response)
            WHERE w.id = u.id
            "#,
        )
        .bind(ids)
        .bind(successes)
        .bind(failures)
        .bind(responses)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
pub struct InsertWebhook {
    pub fields: WebhookFields,
}

impl Processor<InsertWebhook> for DatabaseProcessor {
    type Output = WebhookRow;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertWebhook")]
    async fn process(&self, cmd: InsertWebhook) -> Result<WebhookRow, sqlx::Error> {
        let fields = cmd.fields;
        let sql = format!(
            "INSERT INTO webhooks \
             (name, signal, ref, endpoint, headers, auth_token, enabled, keep_last_response) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {WEBHOOK_COLUMNS}"
        );
        sqlx::query_as::<_, WebhookRow>(&sql)
            .bind(fields.name)
            .bind(fields.signal)
            .bind(fields.type_ref)
            .bind(fields.endpoint)
            .bind(Json(fields.headers))
            .bind(fields.auth_token)
            .bind(fields.enabled)
            .bind(fields.keep_last_response)
            .fetch_one(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct UpdateWebhook {
    pub id: i64,
    pub fields: WebhookFields,
}

impl Processor<UpdateWebhook> for DatabaseProcessor {
    type Output = Option<WebhookRow>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateWebhook")]
    async fn process(&self, cmd: UpdateWebhook) -> Result<Option<WebhookRow>, sqlx::Error> {
        let fields = cmd.fields;
        let sql = format!(
            "UPDATE webhooks SET name = $2, signal = $3, ref = $4, endpoint = $5, \
             headers = $6, auth_token = $7, enabled = $8, keep_last_response = $9, \
             updated = NOW() \
             WHERE id = $1 \
             RETURNING {WEBHOOK_COLUMNS}"
        );
        sqlx::query_as::<_, WebhookRow>(&sql)
            .bind(cmd.id)
            .bind(fields.name)
            .bind(fields.signal)
            .bind(fields.type_ref)
            .bind(fields.endpoint)
            .bind(Json(fields.headers))
            .bind(fields.auth_token)
            .bind(fields.enabled)
            .bind(fields.keep_last_response)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct GetWebhookById {
    pub id: i64,
}

impl Processor<GetWebhookById> for DatabaseProcessor {
    type Output = Option<WebhookRow>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetWebhookById")]
    async fn process(&self, query: GetWebhookById) -> Result<Option<WebhookRow>, sqlx::Error> {
        let sql = format!("SELECT {WEBHOOK_COLUMNS} FROM webhooks WHERE id = $1");
        sqlx::query_as::<_, WebhookRow>(&sql)
            .bind(query.id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct ListWebhooks;

impl Processor<ListWebhooks> for DatabaseProcessor {
    type Output = Vec<WebhookRow>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListWebhooks")]
    async fn process(&self, _query: ListWebhooks) -> Result<Vec<WebhookRow>, sqlx::Error> {
        let sql = format!("SELECT {WEBHOOK_COLUMNS} FROM webhooks ORDER BY id");
        sqlx::query_as::<_, WebhookRow>(&sql)
            .fetch_all(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct DeleteWebhook {
    pub id: i64,
}

impl Processor<DeleteWebhook> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:DeleteWebhook")]
    async fn process(&self, cmd: DeleteWebhook) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM webhooks WHERE id = $1")
            .bind(cmd.id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// A unique key of the `webhooks` table.
#[derive(Debug, Clone)]
pub enum WebhookKey {
    Name(String),
    Target { type_ref: String, endpoint: String },
}

#[derive(Debug, Clone)]
/// Whether a webhook other than `exclude` already holds `key`.
pub struct WebhookExists {
    pub key: WebhookKey,
    pub exclude: Option<i64>,
}

impl Processor<WebhookExists> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:WebhookExists")]
    async fn process(&self, query: WebhookExists) -> Result<bool, sqlx::Error> {
        let mut query_builder = sqlx::QueryBuilder::new("SELECT EXISTS (SELECT 1 FROM webhooks WHERE ");
        match query.key {
            WebhookKey::Name(name) => {
                query_builder.push("name = ").push_bind(name);
            }
            WebhookKey::Target { type_ref, endpoint } => {
                query_builder
                    .push("ref = ")
                    .push_bind(type_ref)
                    .push(" AND endpoint = ")
                    .push_bind(endpoint);
            }
        }
        if let Some(id) = query.exclude {
            query_builder.push(" AND id <> ").push_bind(id);
        }
        query_builder.push(")");

        query_builder
            .build_query_scalar::<bool>()
            .fetch_one(&self.pool)
            .await
    }
}

/// Postgres-backed registration store.
///
/// Tokens are encrypted with the cipher of the current settings on write and
/// decrypted on read.
pub struct PgRegistrationStore {
    processor: DatabaseProcessor,
    config: ConfigStore<Settings>,
}

impl PgRegistrationStore {
    pub fn new(pool: sqlx::PgPool, config: ConfigStore<Settings>) -> Self {
        Self {
            processor: DatabaseProcessor { pool },
            config,
        }
    }

    async fn decode_rows(&self, rows: Vec<WebhookRow>) -> Result<Vec<Registration>, StoreError> {
        let settings = self.config.load().await;
        rows.into_iter()
            .map(|row| row.into_registration(&settings))
            .collect()
    }

    async fn decode_row(&self, row: WebhookRow) -> Result<Registration, StoreError> {
        let settings = self.config.load().await;
        row.into_registration(&settings)
    }

    async fn exists(&self, key: WebhookKey, exclude: Option<i64>) -> Result<bool, StoreError> {
        Ok(self
            .processor
            .process(WebhookExists { key, exclude })
            .await?)
    }
}

/// Signal names to match, plus the legacy integer codes of the same signals.
fn signal_values(signals: &[Signal]) -> Vec<String> {
    let mut values: Vec<String> = signals
        .iter()
        .map(|signal| signal.as_str().to_string())
        .collect();
    values.extend((0..=6).filter_map(|code| {
        Signal::from_legacy_code(code)
            .filter(|signal| signals.contains(signal))
            .map(|_| code.to_string())
    }));
    values
}

fn map_write_error(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.constraint().unwrap_or("unique").to_string())
        }
        _ => StoreError::Database(e),
    }
}

#[async_trait]
impl RegistrationStore for PgRegistrationStore {
    async fn find_matching(
        &self,
        type_ref: &str,
        signals: &[Signal],
        filters: &[RegistrationFilter],
    ) -> Result<Vec<Registration>, StoreError> {
        let rows = self
            .processor
            .process(FindMatchingWebhooks {
                type_ref: type_ref.to_string(),
                signals: signal_values(signals),
                filters: filters.to_vec(),
            })
            .await?;
        self.decode_rows(rows).await
    }

    async fn batch_update_outcome(&self, registrations: &[Registration]) -> Result<(), StoreError> {
        let outcomes = registrations
            .iter()
            .map(|registration| WebhookOutcome {
                id: registration.id,
                last_success: registration.last_success,
                last_failure: registration.last_failure,
                last_response: registration.last_response.clone(),
            })
            .collect();
        self.processor
            .process(BatchUpdateWebhookOutcome { outcomes })
            .await?;
        Ok(())
    }

    async fn insert(&self, new: NewRegistration) -> Result<Registration, StoreError> {
        let fields = {
            let settings = self.config.load().await;
            WebhookFields::seal(new, &settings)?
        };
        let row = self
            .processor
            .process(InsertWebhook { fields })
            .await
            .map_err(map_write_error)?;
        self.decode_row(row).await
    }

    async fn get(&self, id: i64) -> Result<Option<Registration>, StoreError> {
        match self.processor.process(GetWebhookById { id }).await? {
            Some(row) => Ok(Some(self.decode_row(row).await?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Registration>, StoreError> {
        let rows = self.processor.process(ListWebhooks).await?;
        self.decode_rows(rows).await
    }

    async fn update(&self, id: i64, new: NewRegistration) -> Result<Registration, StoreError> {
        let fields = {
            let settings = self.config.load().await;
            WebhookFields::seal(new, &settings)?
        };
        let row = self
            .processor
            .process(UpdateWebhook { id, fields })
            .await
            .map_err(map_write_error)?
            .ok_or(StoreError::NotFound(id))?;
        self.decode_row(row).await
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let removed = self.processor.process(DeleteWebhook { id }).await?;
        Ok(removed > 0)
    }

    async fn name_taken(&self, name: &str, exclude: Option<i64>) -> Result<bool, StoreError> {
        self.exists(WebhookKey::Name(name.to_string()), exclude)
            .await
    }

    async fn target_taken(
        &self,
        type_ref: &str,
        endpoint: &str,
        exclude: Option<i64>,
    ) -> Result<bool, StoreError> {
        self.exists(
            WebhookKey::Target {
                type_ref: type_ref.to_string(),
                endpoint: endpoint.to_string(),
            },
            exclude,
        )
        .await
    }
}
