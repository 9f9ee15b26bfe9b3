//! Versioned config holder with atomic reload.
//!
//! `ConfigStore<T>` keeps the current value behind an `Arc` and swaps the
//! whole `Arc` on reload, so a reader that loaded a snapshot keeps seeing a
//! consistent value for as long as it holds it. Watchers are told about
//! every reload through a `watch` channel carrying the new version.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, watch};

pub struct ConfigStore<T> {
    inner: Arc<ConfigStoreInner<T>>,
}

struct ConfigStoreInner<T> {
    current: RwLock<Arc<T>>,
    version: AtomicU64,
    version_tx: watch::Sender<u64>,
}

/// Receives notifications when a [`ConfigStore`] is reloaded.
pub struct ConfigWatcher {
    version_rx: watch::Receiver<u64>,
}

impl<T> ConfigStore<T> {
    pub fn new(initial: T) -> Self {
        let (version_tx, _) = watch::channel(0u64);
        Self {
            inner: Arc::new(ConfigStoreInner {
                current: RwLock::new(Arc::new(initial)),
                version: AtomicU64::new(0),
                version_tx,
            }),
        }
    }

    /// Snapshot of the current value.
    pub async fn load(&self) -> Arc<T> {
        Arc::clone(&*self.inner.current.read().await)
    }

    /// Swap in a new value and notify all watchers. Returns the new version.
    pub async fn reload(&self, value: T) -> u64 {
        let mut guard = self.inner.current.write().await;
        *guard = Arc::new(value);
        let new_version = self.inner.version.fetch_add(1, Ordering::Relaxed) + 1;
        drop(guard);
        let _ = self.inner.version_tx.send(new_version);
        new_version
    }

    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Relaxed)
    }

    pub fn subscribe(&self) -> ConfigWatcher {
        ConfigWatcher {
            version_rx: self.inner.version_tx.subscribe(),
        }
    }
}

impl<T> Clone for ConfigStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ConfigWatcher {
    /// Wait until the store is reloaded.
    ///
    /// Errors once the [`ConfigStore`] has been dropped.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.version_rx.changed().await
    }

    pub fn version(&self) -> u64 {
        *self.version_rx.borrow()
    }
}
