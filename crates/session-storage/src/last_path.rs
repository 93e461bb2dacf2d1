//! Per-tab "where was the user before the auth change" route.

use crate::{KeyValueStore, StorageKeys, StorageResult};
use std::sync::Arc;

#[derive(Clone)]
pub struct LastKnownPathStore {
    store: Arc<dyn KeyValueStore>,
}

impl LastKnownPathStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn get(&self) -> StorageResult<Option<String>> {
        Ok(self
            .store
            .get(StorageKeys::LAST_KNOWN_PATH)?
            .filter(|p| !p.is_empty()))
    }

    /// `None` removes the entry.
    pub fn set(&self, path: Option<&str>) -> StorageResult<()> {
        match path {
            Some(path) => self.store.set(StorageKeys::LAST_KNOWN_PATH, path),
            None => self.store.delete(StorageKeys::LAST_KNOWN_PATH).map(|_| ()),
        }
    }
}
