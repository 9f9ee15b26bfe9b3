//! Swappable strategies used by the router and the dispatcher.
//!
//! Every strategy is registered under a name in an [`ExtensionRegistry`] and
//! picked by name from the `[webhooks]` settings. Names are resolved once
//! when settings load; an unknown name is a configuration error.
//!
//! Plain closures with the right signature implement the synchronous
//! strategy traits, so small customizations need no extra types.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::config::ConfigError;
use crate::entities::Registration;
use crate::events::{HookContext, HookTask};
use crate::processors::scheduler::SyncScheduler;
use crate::record::Record;
use crate::store::RegistrationFilter;
use crate::utils::headers::{Headers, set_header};
use hookline_sdk::config::USE_DEFAULT;
use hookline_sdk::objects::EventKind;

/// Name of the inline scheduler.
pub const SYNC_SCHEDULER: &str = "sync";
/// Name of the background pool scheduler.
pub const BACKGROUND_SCHEDULER: &str = "background";

/// Why a record produced no webhook data.
#[derive(Debug, Error)]
pub enum SerializeError {
    /// The record asked for the webhook not to be sent.
    #[error("{0}")]
    Cancelled(String),
    #[error("could not build webhook data: {0}")]
    Failed(#[source] Box<dyn StdError + Send + Sync>),
}

impl SerializeError {
    pub fn cancelled(reason: impl Into<String>) -> Self {
        SerializeError::Cancelled(reason.into())
    }

    pub fn failed(error: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        SerializeError::Failed(error.into())
    }
}

/// Turns a record into the JSON payload sent to every endpoint.
pub trait Serializer: Send + Sync {
    fn serialize(&self, record: &dyn Record) -> Result<Value, SerializeError>;
}

impl<F> Serializer for F
where
    F: Fn(&dyn Record) -> Result<Value, SerializeError> + Send + Sync,
{
    fn serialize(&self, record: &dyn Record) -> Result<Value, SerializeError> {
        self(record)
    }
}

/// Serializes `{"model", "pk", "fields"}`, unless the record supplies its own
/// webhook data.
///
/// Relations that cannot be traversed (for example on a deleted record)
/// serialize as an empty list.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSerializer;

impl Serializer for DefaultSerializer {
    fn serialize(&self, record: &dyn Record) -> Result<Value, SerializeError> {
        if let Some(data) = record.webhook_data() {
            return data;
        }

        let mut fields = record.fields();
        for relation in record.relations() {
            let members = match relation.members {
                Ok(members) => members,
                Err(e) => {
                    warn!(
                        type_ref = record.type_ref(),
                        relation = %relation.name,
                        error = %e,
                        "Dropping relation from webhook data"
                    );
                    Vec::new()
                }
            };
            fields.insert(relation.name, Value::Array(members));
        }

        let mut data = Map::new();
        data.insert("model".to_string(), Value::from(record.type_ref()));
        data.insert("pk".to_string(), record.primary_key());
        data.insert("fields".to_string(), Value::Object(fields));
        Ok(Value::Object(data))
    }
}

/// Extra per-call request parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientParams {
    /// Base headers; registration headers are merged over these.
    pub headers: Headers,
    pub query: Vec<(String, String)>,
    /// Overrides the configured timeout for this call.
    pub timeout: Option<Duration>,
    /// Replaces the serialized payload as the request body.
    pub json: Option<Value>,
}

impl ClientParams {
    pub fn basic_auth(mut self, username: &str, password: &str) -> Self {
        let credentials = fast32::base64::RFC4648.encode(format!("{username}:{password}").as_bytes());
        set_header(&mut self.headers, "Authorization", format!("Basic {credentials}"));
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        set_header(&mut self.headers, name, value);
        self
    }
}

pub trait ClientParamsBuilder: Send + Sync {
    fn build(&self, registration: &Registration) -> ClientParams;
}

impl<F> ClientParamsBuilder for F
where
    F: Fn(&Registration) -> ClientParams + Send + Sync,
{
    fn build(&self, registration: &Registration) -> ClientParams {
        self(registration)
    }
}

/// Adds constraints to the registration lookup for an event.
pub trait FilterExtension: Send + Sync {
    fn filters(&self, record: &dyn Record, kind: EventKind) -> Vec<RegistrationFilter>;
}

impl<F> FilterExtension for F
where
    F: Fn(&dyn Record, EventKind) -> Vec<RegistrationFilter> + Send + Sync,
{
    fn filters(&self, record: &dyn Record, kind: EventKind) -> Vec<RegistrationFilter> {
        self(record, kind)
    }
}

/// Called once for every failed call.
///
/// `error` is the transport error, or `None` when the endpoint answered with
/// a non-2xx status.
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, registration: &Registration, error: Option<&reqwest::Error>);
}

impl<F> ErrorHandler for F
where
    F: Fn(&Registration, Option<&reqwest::Error>) + Send + Sync,
{
    fn handle(&self, registration: &Registration, error: Option<&reqwest::Error>) {
        self(registration, error)
    }
}

/// Decides how and when a scheduled hook runs.
#[async_trait]
pub trait TaskScheduler: Send + Sync {
    async fn schedule(&self, task: HookTask);
}

/// Runs the webhook side of an event once it has been routed.
///
/// The built-in handler is the [`Dispatcher`](crate::processors::Dispatcher);
/// custom handlers can be registered per model and event kind.
#[async_trait]
pub trait HookHandler: Send + Sync {
    async fn handle(&self, ctx: HookContext);
}

/// Named strategies available to settings.
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    serializers: HashMap<String, Arc<dyn Serializer>>,
    client_params: HashMap<String, Arc<dyn ClientParamsBuilder>>,
    filters: HashMap<String, Arc<dyn FilterExtension>>,
    error_handlers: HashMap<String, Arc<dyn ErrorHandler>>,
    schedulers: HashMap<String, Arc<dyn TaskScheduler>>,
    hooks: HashMap<String, Arc<dyn HookHandler>>,
}

impl ExtensionRegistry {
    /// A registry holding the built-in strategies and the inline scheduler.
    ///
    /// The background scheduler needs a running pool and is registered by
    /// whoever spawns it.
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        registry.register_serializer(USE_DEFAULT, DefaultSerializer);
        registry.register_client_params(USE_DEFAULT, |_: &Registration| ClientParams::default());
        registry.register_filter(USE_DEFAULT, |_: &dyn Record, _: EventKind| {
            Vec::<RegistrationFilter>::new()
        });
        registry.register_error_handler(
            USE_DEFAULT,
            |_: &Registration, _: Option<&reqwest::Error>| {},
        );
        registry.register_scheduler(SYNC_SCHEDULER, SyncScheduler);
        registry
    }

    pub fn register_serializer(&mut self, name: &str, serializer: impl Serializer + 'static) {
        self.serializers
            .insert(name.to_string(), Arc::new(serializer));
    }

    pub fn register_client_params(
        &mut self,
        name: &str,
        builder: impl ClientParamsBuilder + 'static,
    ) {
        self.client_params
            .insert(name.to_string(), Arc::new(builder));
    }

    pub fn register_filter(&mut self, name: &str, filter: impl FilterExtension + 'static) {
        self.filters.insert(name.to_string(), Arc::new(filter));
    }

    pub fn register_error_handler(&mut self, name: &str, handler: impl ErrorHandler + 'static) {
        self.error_handlers
            .insert(name.to_string(), Arc::new(handler));
    }

    pub fn register_scheduler(&mut self, name: &str, scheduler: impl TaskScheduler + 'static) {
        self.schedulers
            .insert(name.to_string(), Arc::new(scheduler));
    }

    pub fn register_hook(&mut self, name: &str, hook: Arc<dyn HookHandler>) {
        self.hooks.insert(name.to_string(), hook);
    }

    pub fn serializer(&self, name: &str) -> Result<Arc<dyn Serializer>, ConfigError> {
        lookup(&self.serializers, "serializer", name)
    }

    pub fn client_params(&self, name: &str) -> Result<Arc<dyn ClientParamsBuilder>, ConfigError> {
        lookup(&self.client_params, "client params builder", name)
    }

    pub fn filter(&self, name: &str) -> Result<Arc<dyn FilterExtension>, ConfigError> {
        lookup(&self.filters, "filter", name)
    }

    pub fn error_handler(&self, name: &str) -> Result<Arc<dyn ErrorHandler>, ConfigError> {
        lookup(&self.error_handlers, "error handler", name)
    }

    pub fn scheduler(&self, name: &str) -> Result<Arc<dyn TaskScheduler>, ConfigError> {
        lookup(&self.schedulers, "task handler", name)
    }

    pub fn hook(&self, name: &str) -> Result<Arc<dyn HookHandler>, ConfigError> {
        lookup(&self.hooks, "hook handler", name)
    }
}

fn lookup<T: ?Sized>(
    map: &HashMap<String, Arc<T>>,
    kind: &'static str,
    name: &str,
) -> Result<Arc<T>, ConfigError> {
    map.get(name)
        .cloned()
        .ok_or_else(|| ConfigError::UnknownExtension {
            kind,
            name: name.to_string(),
        })
}
