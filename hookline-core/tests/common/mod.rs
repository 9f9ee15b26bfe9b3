//! Common test utilities for hookline-core integration tests.
//!
//! Provides record fixtures, a router wired to the in-memory store and the
//! synchronous scheduler, and a tracing layer that captures log events.

#![allow(dead_code)]

use hookline_core::config::{ConfigStore, Settings};
use hookline_core::entities::{NewRegistration, Registration};
use hookline_core::extensions::{ExtensionRegistry, SerializeError};
use hookline_core::processors::{Dispatcher, EventRouter};
use hookline_core::record::Record;
use hookline_core::store::{MemoryRegistrationStore, RegistrationStore};
use hookline_core::Signal;
use hookline_sdk::config::{RawHook, RawSettings, USE_DEFAULT};
use serde_json::{Map, Value, json};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

pub const USER: &str = "auth.models.User";
pub const GROUP: &str = "auth.models.Group";

/// A user model row.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub groups: Vec<i64>,
    pub deleted: bool,
}

impl User {
    pub fn new(id: i64, username: &str) -> Arc<dyn Record> {
        Arc::new(Self {
            id,
            username: username.to_string(),
            groups: vec![1, 2],
            deleted: false,
        })
    }

    pub fn deleted(id: i64, username: &str) -> Arc<dyn Record> {
        Arc::new(Self {
            id,
            username: username.to_string(),
            groups: vec![1, 2],
            deleted: true,
        })
    }
}

impl Record for User {
    fn type_ref(&self) -> &str {
        USER
    }

    fn primary_key(&self) -> Value {
        json!(self.id)
    }

    fn fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("username".to_string(), json!(self.username));
        fields
    }

    fn relations(&self) -> Vec<hookline_core::record::Relation> {
        let members = if self.deleted {
            Err(hookline_core::record::RelationError {
                relation: "groups".to_string(),
                reason: "instance has no primary key".to_string(),
            })
        } else {
            Ok(self.groups.iter().map(|id| json!(id)).collect())
        };
        vec![hookline_core::record::Relation {
            name: "groups".to_string(),
            members,
        }]
    }
}

/// A group whose webhooks are always cancelled by the model itself.
#[derive(Debug, Clone)]
pub struct SilentGroup;

impl Record for SilentGroup {
    fn type_ref(&self) -> &str {
        GROUP
    }

    fn primary_key(&self) -> Value {
        json!(1)
    }

    fn fields(&self) -> Map<String, Value> {
        Map::new()
    }

    fn webhook_data(&self) -> Option<Result<Value, SerializeError>> {
        Some(Err(SerializeError::cancelled("Just because.")))
    }
}

// ---------------------------------------------------------------------------
// Harness - router + dispatcher + memory store
// ---------------------------------------------------------------------------

pub struct Harness {
    pub store: Arc<MemoryRegistrationStore>,
    pub config: ConfigStore<Settings>,
    pub router: EventRouter,
}

/// Default settings: sync scheduler, one-second timeout, users and groups
/// hooked with the default handler.
pub fn raw_settings() -> RawSettings {
    let mut raw = RawSettings {
        task_handler: "sync".to_string(),
        timeout: 1,
        ..RawSettings::default()
    };
    raw.hooks
        .insert(USER.to_string(), RawHook::Marker(USE_DEFAULT.to_string()));
    raw.hooks
        .insert(GROUP.to_string(), RawHook::Marker(USE_DEFAULT.to_string()));
    raw
}

pub fn harness() -> Harness {
    harness_with(|_, _| {})
}

pub fn harness_with(configure: impl FnOnce(&mut RawSettings, &mut ExtensionRegistry)) -> Harness {
    let mut raw = raw_settings();
    let mut registry = ExtensionRegistry::with_defaults();
    configure(&mut raw, &mut registry);
    let settings = Settings::resolve(&raw, &registry).unwrap();
    let config = ConfigStore::new(settings);
    let store = Arc::new(MemoryRegistrationStore::new());
    let router = EventRouter::new(config.clone(), Arc::new(Dispatcher::new(store.clone())));
    Harness {
        store,
        config,
        router,
    }
}

pub fn new_registration(name: &str, signal: Signal, endpoint: String) -> NewRegistration {
    NewRegistration {
        name: name.to_string(),
        signal,
        type_ref: USER.to_string(),
        endpoint,
        headers: json!({}),
        auth_token: String::new(),
        enabled: true,
        keep_last_response: false,
    }
}

impl Harness {
    pub async fn register(&self, new: NewRegistration) -> Registration {
        self.store.insert(new).await.unwrap()
    }

    pub async fn reload(&self, raw: &RawSettings, registry: &ExtensionRegistry) {
        let settings = Settings::resolve(raw, registry).unwrap();
        self.config.reload(settings).await;
    }

    pub async fn stored(&self, id: i64) -> Registration {
        self.store.get(id).await.unwrap().unwrap()
    }
}

// ---------------------------------------------------------------------------
// CaptureLayer - collects tracing events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

/// A tracing layer that records every event it sees.
#[derive(Clone, Default)]
pub struct CaptureLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CaptureLayer {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn at_level(&self, level: Level) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.level == level)
            .collect()
    }
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields
                .push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields
                .push((field.name().to_string(), format!("{value:?}")));
        }
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

/// Capture events emitted on this thread until the guard is dropped.
pub fn capture_logs() -> (CaptureLayer, tracing::subscriber::DefaultGuard) {
    use tracing_subscriber::layer::SubscriberExt;

    let layer = CaptureLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());
    let guard = tracing::subscriber::set_default(subscriber);
    (layer, guard)
}
