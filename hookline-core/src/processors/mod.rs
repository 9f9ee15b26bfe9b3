//! Processors of the dispatch pipeline.
//!
//! - `EventRouter`: receives `LifecycleEvent`, emits `HookTask` to the scheduler
//! - `SyncScheduler` / `BackgroundScheduler` + `DispatchPool`: run `HookTask`s
//! - `Dispatcher`: the default hook, fans out HTTP calls and saves outcomes

pub mod dispatcher;
pub mod router;
pub mod scheduler;

pub use dispatcher::{Dispatcher, dispatch};
pub use router::{EventRouter, RouteOutcome};
pub use scheduler::{
    BackgroundScheduler, DispatchPool, DispatchPoolHandle, SyncScheduler, spawn_dispatch_pool,
};
