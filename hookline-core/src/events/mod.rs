//! Lifecycle events and the tasks they turn into.
//!
//! # Flow
//!
//! 1. The application reports a `LifecycleEvent`
//! 2. `EventRouter` resolves the hook and serializes the record into a `HookTask`
//! 3. The configured `TaskScheduler` runs the task inline or hands it to the
//!    background pool over a `hook_task_channel`
//! 4. The hook (normally the `Dispatcher`) fans out the HTTP calls

pub mod channels;
pub mod types;

pub use channels::{HookTaskReceiver, HookTaskSender, hook_task_channel};
pub use types::{HookContext, HookTask, LifecycleEvent};
