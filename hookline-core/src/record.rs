//! Records carried by lifecycle events.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;

use crate::extensions::SerializeError;
use hookline_sdk::objects::LifecycleEventRequest;

/// A relation that could not be read, e.g. after the owning record was
/// deleted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("relation '{relation}' cannot be traversed: {reason}")]
pub struct RelationError {
    pub relation: String,
    pub reason: String,
}

/// A many-to-many relation of a record, as primary keys of the related rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub name: String,
    pub members: Result<Vec<Value>, RelationError>,
}

/// A data-model instance that can fire webhooks.
pub trait Record: Send + Sync + fmt::Debug {
    /// Dotted reference of the model type, e.g. `shop.models.Order`.
    fn type_ref(&self) -> &str;

    fn primary_key(&self) -> Value;

    /// Scalar fields by name.
    fn fields(&self) -> Map<String, Value>;

    fn relations(&self) -> Vec<Relation> {
        Vec::new()
    }

    /// Model-specific webhook payload. When this returns `Some`, it replaces
    /// the generic serialization.
    fn webhook_data(&self) -> Option<Result<Value, SerializeError>> {
        None
    }
}

/// A record built from loose JSON, used by the ingest API.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicRecord {
    type_ref: String,
    pk: Value,
    fields: Map<String, Value>,
    relations: BTreeMap<String, Vec<Value>>,
    deleted: bool,
}

impl DynamicRecord {
    pub fn new(type_ref: impl Into<String>, pk: impl Into<Value>) -> Self {
        Self {
            type_ref: type_ref.into(),
            pk: pk.into(),
            fields: Map::new(),
            relations: BTreeMap::new(),
            deleted: false,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_relation(mut self, name: impl Into<String>, members: Vec<Value>) -> Self {
        self.relations.insert(name.into(), members);
        self
    }

    /// Relations of a deleted record can no longer be traversed.
    pub fn mark_deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    pub fn from_request(request: LifecycleEventRequest) -> Self {
        Self {
            type_ref: request.type_ref,
            pk: request.pk,
            fields: request.fields,
            relations: request.relations,
            deleted: false,
        }
    }
}

impl Record for DynamicRecord {
    fn type_ref(&self) -> &str {
        &self.type_ref
    }

    fn primary_key(&self) -> Value {
        self.pk.clone()
    }

    fn fields(&self) -> Map<String, Value> {
        self.fields.clone()
    }

    fn relations(&self) -> Vec<Relation> {
        self.relations
            .iter()
            .map(|(name, members)| Relation {
                name: name.clone(),
                members: if self.deleted {
                    Err(RelationError {
                        relation: name.clone(),
                        reason: "record has been deleted".to_string(),
                    })
                } else {
                    Ok(members.clone())
                },
            })
            .collect()
    }
}

/// The set of model types the application knows about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelRegistry {
    known: HashSet<String>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, type_ref: impl Into<String>) {
        self.known.insert(type_ref.into());
    }

    pub fn contains(&self, type_ref: &str) -> bool {
        self.known.contains(type_ref)
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ModelRegistry {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            known: iter.into_iter().map(Into::into).collect(),
        }
    }
}
