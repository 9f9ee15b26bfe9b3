//! Task schedulers.
//!
//! - `SyncScheduler` runs a task to completion before `schedule` returns.
//! - `BackgroundScheduler` queues the task for a [`DispatchPool`], which runs
//!   at most `max_in_flight` tasks at once and drains its queue on shutdown.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::events::{HookTask, HookTaskReceiver, HookTaskSender, hook_task_channel};
use crate::extensions::TaskScheduler;

/// Runs hooks inline on the routing task.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncScheduler;

#[async_trait]
impl TaskScheduler for SyncScheduler {
    async fn schedule(&self, task: HookTask) {
        task.run().await;
    }
}

/// Queues hooks for the background [`DispatchPool`].
#[derive(Debug, Clone)]
pub struct BackgroundScheduler {
    tx: HookTaskSender,
}

impl BackgroundScheduler {
    pub fn new(tx: HookTaskSender) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl TaskScheduler for BackgroundScheduler {
    /// Returns once the task is queued. Waits only while the queue is full.
    async fn schedule(&self, task: HookTask) {
        let task = match self.tx.try_send(task) {
            Ok(()) => return,
            Err(TrySendError::Full(task)) => {
                warn!(type_ref = %task.type_ref(), "Webhook queue full, waiting for capacity");
                task
            }
            Err(TrySendError::Closed(task)) => {
                error!(type_ref = %task.type_ref(), "Dispatch pool is stopped, dropping webhook task");
                return;
            }
        };
        if let Err(e) = self.tx.send(task).await {
            error!(type_ref = %e.0.type_ref(), "Dispatch pool is stopped, dropping webhook task");
        }
    }
}

/// Bounded worker pool running queued hook tasks.
pub struct DispatchPool {
    max_in_flight: usize,
}

impl DispatchPool {
    /// `max_in_flight` is clamped to at least one.
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Run until shutdown is signalled or every sender is gone.
    ///
    /// On shutdown the pool stops taking new tasks, runs what is already
    /// queued and waits for every running task to finish.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>, mut task_rx: HookTaskReceiver) {
        info!(max_in_flight = self.max_in_flight, "DispatchPool started");
        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("DispatchPool received shutdown signal");
                        break;
                    }
                }

                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Webhook task aborted");
                    }
                }

                received = task_rx.recv() => {
                    match received {
                        Some(task) => {
                            spawn_limited(&mut in_flight, &permits, task).await;
                        }
                        None => {
                            info!("Hook task channel closed");
                            break;
                        }
                    }
                }
            }
        }

        task_rx.close();
        while let Some(task) = task_rx.recv().await {
            spawn_limited(&mut in_flight, &permits, task).await;
        }
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Webhook task aborted");
            }
        }
        info!("DispatchPool shutdown complete");
    }
}

async fn spawn_limited(in_flight: &mut JoinSet<()>, permits: &Arc<Semaphore>, task: HookTask) {
    let Ok(permit) = Arc::clone(permits).acquire_owned().await else {
        error!(type_ref = %task.type_ref(), "Dispatch pool permits closed, dropping webhook task");
        return;
    };
    debug!(type_ref = %task.type_ref(), "Running webhook task");
    in_flight.spawn(async move {
        task.run().await;
        drop(permit);
    });
}

/// Handle for stopping a spawned [`DispatchPool`].
pub struct DispatchPoolHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl DispatchPoolHandle {
    /// Stop intake and wait for queued and running tasks to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            error!(error = %e, "DispatchPool task failed");
        }
    }
}

/// Spawn a [`DispatchPool`] and return the scheduler feeding it.
pub fn spawn_dispatch_pool(
    queue_capacity: usize,
    max_in_flight: usize,
) -> (BackgroundScheduler, DispatchPoolHandle) {
    let (task_tx, task_rx) = hook_task_channel(queue_capacity.max(1));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let join = tokio::spawn(DispatchPool::new(max_in_flight).run(shutdown_rx, task_rx));
    (
        BackgroundScheduler::new(task_tx),
        DispatchPoolHandle { shutdown_tx, join },
    )
}
