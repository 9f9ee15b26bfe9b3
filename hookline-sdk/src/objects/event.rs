//! Lifecycle event objects accepted by the ingest endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::signal::EventKind;

/// Phase of a many-to-many change as reported by the event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum M2mAction {
    PreAdd,
    PostAdd,
    PreRemove,
    PostRemove,
    PreClear,
    PostClear,
}

impl M2mAction {
    /// Only the `post_*` phases map to a webhook kind.
    pub fn event_kind(self) -> Option<EventKind> {
        match self {
            M2mAction::PostAdd => Some(EventKind::M2mAdd),
            M2mAction::PostRemove => Some(EventKind::M2mRemove),
            M2mAction::PostClear => Some(EventKind::M2mClear),
            M2mAction::PreAdd | M2mAction::PreRemove | M2mAction::PreClear => None,
        }
    }
}

/// What happened to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordAction {
    Created,
    Updated,
    Deleted,
    M2mChanged(M2mAction),
}

impl RecordAction {
    pub fn event_kind(self) -> Option<EventKind> {
        match self {
            RecordAction::Created => Some(EventKind::Create),
            RecordAction::Updated => Some(EventKind::Update),
            RecordAction::Deleted => Some(EventKind::Delete),
            RecordAction::M2mChanged(action) => action.event_kind(),
        }
    }
}

/// A record lifecycle event delivered over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEventRequest {
    /// Dotted reference of the record's model type, e.g. `shop.models.Order`.
    pub type_ref: String,
    pub action: RecordAction,
    pub pk: Value,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub relations: BTreeMap<String, Vec<Value>>,
}

/// How the router disposed of an ingested event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteResponse {
    Scheduled,
    Dropped,
    Cancelled,
    Failed,
}
