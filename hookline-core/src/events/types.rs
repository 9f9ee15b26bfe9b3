//! Event and task types flowing through the dispatch pipeline.
//!
//! A [`LifecycleEvent`] is produced by the application whenever a record
//! changes and is consumed once by the router. A routed event becomes a
//! [`HookTask`]: the hook to run plus everything it needs, including the
//! settings snapshot that was current when the event was routed.

use hookline_sdk::objects::{EventKind, M2mAction, RecordAction};
use serde_json::Value;
use std::sync::Arc;

use crate::config::Settings;
use crate::extensions::HookHandler;
use crate::record::Record;

/// A record changed.
#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    pub kind: EventKind,
    pub record: Arc<dyn Record>,
}

impl LifecycleEvent {
    pub fn new(kind: EventKind, record: Arc<dyn Record>) -> Self {
        Self { kind, record }
    }

    /// A record was saved; `created` tells inserts from updates.
    pub fn saved(record: Arc<dyn Record>, created: bool) -> Self {
        let kind = if created {
            EventKind::Create
        } else {
            EventKind::Update
        };
        Self::new(kind, record)
    }

    pub fn deleted(record: Arc<dyn Record>) -> Self {
        Self::new(EventKind::Delete, record)
    }

    /// A many-to-many relation changed. `pre_*` phases produce no event.
    pub fn m2m_changed(record: Arc<dyn Record>, action: M2mAction) -> Option<Self> {
        action.event_kind().map(|kind| Self::new(kind, record))
    }

    pub fn from_action(record: Arc<dyn Record>, action: RecordAction) -> Option<Self> {
        action.event_kind().map(|kind| Self::new(kind, record))
    }
}

/// Everything a hook handler receives for one routed event.
#[derive(Clone)]
pub struct HookContext {
    pub record: Arc<dyn Record>,
    /// The serialized payload.
    pub data: Value,
    pub kind: EventKind,
    pub settings: Arc<Settings>,
}

/// A routed event waiting to be run by a scheduler.
pub struct HookTask {
    pub hook: Arc<dyn HookHandler>,
    pub ctx: HookContext,
}

impl HookTask {
    pub async fn run(self) {
        self.hook.handle(self.ctx).await;
    }

    pub fn type_ref(&self) -> &str {
        self.ctx.record.type_ref()
    }
}
