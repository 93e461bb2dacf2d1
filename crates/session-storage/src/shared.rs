//! Origin-wide storage with change notifications.

use crate::{KeyValueStore, StorageResult};
use std::sync::Arc;
use tokio::sync::broadcast;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// A write observed on the shared store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub key: String,
    /// `None` when the key was removed.
    pub new_value: Option<String>,
    /// Tab that performed the write.
    pub origin: String,
}

/// Storage shared by every tab of an origin.
///
/// Tabs never write through `SharedStorage` directly; each gets a
/// [`StorageHandle`] tagged with its id, and every write through a handle is
/// broadcast to all subscribers. Subscribers filter out their own origin,
/// matching the browser rule that a tab is not notified of its own writes.
#[derive(Clone)]
pub struct SharedStorage {
    backend: Arc<dyn KeyValueStore>,
    changes: broadcast::Sender<StorageChange>,
}

impl SharedStorage {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { backend, changes }
    }

    /// Handle through which tab `origin` reads and writes.
    pub fn handle(&self, origin: impl Into<String>) -> StorageHandle {
        StorageHandle {
            shared: self.clone(),
            origin: origin.into(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }

    fn notify(&self, origin: &str, key: &str, new_value: Option<&str>) {
        // No receivers is the normal single-tab case.
        let _ = self.changes.send(StorageChange {
            key: key.to_string(),
            new_value: new_value.map(str::to_string),
            origin: origin.to_string(),
        });
    }
}

/// One tab's view of a [`SharedStorage`].
#[derive(Clone)]
pub struct StorageHandle {
    shared: SharedStorage,
    origin: String,
}

impl StorageHandle {
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Changes made by other tabs and by this one; use [`StorageChange::origin`] to tell them apart.
    pub fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.shared.subscribe()
    }
}

impl KeyValueStore for StorageHandle {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.shared.backend.set(key, value)?;
        self.shared.notify(&self.origin, key, Some(value));
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.shared.backend.get(key)
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let existed = self.shared.backend.delete(key)?;
        if existed {
            self.shared.notify(&self.origin, key, None);
        }
        Ok(existed)
    }
}
