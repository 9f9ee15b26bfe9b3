//! EventRouter processor.
//!
//! The EventRouter is responsible for:
//! - Receiving `LifecycleEvent`s via the `Processor` trait
//! - Resolving the hook configured for the record's model type and event kind
//! - Serializing the record, or dropping the event when serialization is
//!   cancelled or fails
//! - Handing the routed `HookTask` to the configured scheduler
//!
//! Routing never performs network I/O and never fails the caller; every
//! problem is logged and reported through [`RouteOutcome`].

use hookline_sdk::objects::{M2mAction, RouteResponse};
use kanau::processor::Processor;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::{ConfigStore, Hook, Settings};
use crate::events::{HookContext, HookTask, LifecycleEvent};
use crate::extensions::{HookHandler, SerializeError};
use crate::record::Record;

/// How an event was disposed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Handed to the scheduler.
    Scheduled,
    /// No hook configured, or hooks denied for this type or kind.
    Dropped,
    /// The serializer cancelled the webhook.
    Cancelled,
    /// The serializer failed.
    Failed,
}

impl From<RouteOutcome> for RouteResponse {
    fn from(outcome: RouteOutcome) -> Self {
        match outcome {
            RouteOutcome::Scheduled => RouteResponse::Scheduled,
            RouteOutcome::Dropped => RouteResponse::Dropped,
            RouteOutcome::Cancelled => RouteResponse::Cancelled,
            RouteOutcome::Failed => RouteResponse::Failed,
        }
    }
}

/// Routes lifecycle events to hooks.
#[derive(Clone)]
pub struct EventRouter {
    config: ConfigStore<Settings>,
    default_hook: Arc<dyn HookHandler>,
}

impl EventRouter {
    /// `default_hook` runs for types and kinds configured with `"default"`,
    /// normally a [`Dispatcher`](super::Dispatcher).
    pub fn new(config: ConfigStore<Settings>, default_hook: Arc<dyn HookHandler>) -> Self {
        Self {
            config,
            default_hook,
        }
    }

    pub async fn route(&self, event: LifecycleEvent) -> RouteOutcome {
        let settings = self.config.load().await;
        let LifecycleEvent { kind, record } = event;
        let type_ref = record.type_ref().to_string();

        let hook = match settings.hook_for(&type_ref, kind) {
            Hook::NotConfigured | Hook::Denied => {
                debug!(type_ref = %type_ref, kind = %kind, "No webhook hook for event");
                return RouteOutcome::Dropped;
            }
            Hook::UseDefault => Arc::clone(&self.default_hook),
            Hook::Custom(hook) => hook,
        };

        let data = match settings.serializer.serialize(record.as_ref()) {
            Ok(data) => data,
            Err(SerializeError::Cancelled(reason)) => {
                info!(
                    type_ref = %type_ref,
                    kind = %kind,
                    "{} webhook for '{}' cancelled before it was sent. Reason given: {}",
                    kind.label(),
                    type_ref,
                    reason
                );
                return RouteOutcome::Cancelled;
            }
            Err(e) => {
                error!(
                    type_ref = %type_ref,
                    kind = %kind,
                    error = ?e,
                    "Webhook data for '{}' could not be created",
                    type_ref
                );
                return RouteOutcome::Failed;
            }
        };

        let task = HookTask {
            hook,
            ctx: HookContext {
                record,
                data,
                kind,
                settings: Arc::clone(&settings),
            },
        };
        settings.task_scheduler.schedule(task).await;
        RouteOutcome::Scheduled
    }

    /// A record was saved.
    pub async fn on_saved(&self, record: Arc<dyn Record>, created: bool) -> RouteOutcome {
        self.route(LifecycleEvent::saved(record, created)).await
    }

    pub async fn on_deleted(&self, record: Arc<dyn Record>) -> RouteOutcome {
        self.route(LifecycleEvent::deleted(record)).await
    }

    /// `pre_*` phases are dropped without looking at the configuration.
    pub async fn on_m2m_changed(&self, record: Arc<dyn Record>, action: M2mAction) -> RouteOutcome {
        match LifecycleEvent::m2m_changed(record, action) {
            Some(event) => self.route(event).await,
            None => RouteOutcome::Dropped,
        }
    }
}

impl Processor<LifecycleEvent> for EventRouter {
    type Output = RouteOutcome;
    type Error = Infallible;

    async fn process(&self, event: LifecycleEvent) -> Result<RouteOutcome, Infallible> {
        Ok(self.route(event).await)
    }
}
