//! Channel for handing routed tasks to the background pool.

use super::types::HookTask;
use tokio::sync::mpsc;

pub type HookTaskSender = mpsc::Sender<HookTask>;
pub type HookTaskReceiver = mpsc::Receiver<HookTask>;

/// Create a bounded task channel. `capacity` must be positive.
pub fn hook_task_channel(capacity: usize) -> (HookTaskSender, HookTaskReceiver) {
    mpsc::channel(capacity)
}
