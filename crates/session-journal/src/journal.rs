//! Bounded in-memory journal with optional durable redirect snapshots.

use crate::{JournalEntry, NavigationSnapshot, TransitionObserver, TransitionRecord};
use parking_lot::Mutex;
use session_storage::{KeyValueStore, StorageKeys};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

/// Number of redirect snapshots kept in durable storage.
pub const PERSISTED_NAVIGATION_LIMIT: usize = 20;

const LIVE_CHANNEL_CAPACITY: usize = 128;

/// Ring buffer of the most recent journal entries.
///
/// Eviction is O(1): pushing into a full journal drops the oldest entry.
/// Navigation snapshots are additionally written to the per-tab store when
/// one is attached, so a redirect loop can be inspected after the fact.
pub struct Journal {
    capacity: usize,
    entries: Mutex<VecDeque<JournalEntry>>,
    store: Option<Arc<dyn KeyValueStore>>,
    live: broadcast::Sender<JournalEntry>,
}

impl Journal {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (live, _) = broadcast::channel(LIVE_CHANNEL_CAPACITY);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            store: None,
            live,
        }
    }

    /// Persist navigation snapshots into `store` under [`StorageKeys::NAVIGATION_JOURNAL`].
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Entries pushed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<JournalEntry> {
        self.live.subscribe()
    }

    /// Snapshots previously written to the attached store, oldest first.
    pub fn persisted_navigations(&self) -> Vec<NavigationSnapshot> {
        let Some(store) = &self.store else {
            return Vec::new();
        };
        match store.get(StorageKeys::NAVIGATION_JOURNAL) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "discarding unreadable navigation journal");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "navigation journal unavailable");
                Vec::new()
            }
        }
    }

    fn push(&self, entry: JournalEntry) {
        {
            let mut entries = self.entries.lock();
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry.clone());
        }
        let _ = self.live.send(entry);
    }

    fn persist_navigation(&self, snapshot: &NavigationSnapshot) {
        let Some(store) = &self.store else {
            return;
        };
        let mut snapshots = self.persisted_navigations();
        snapshots.push(snapshot.clone());
        let overflow = snapshots.len().saturating_sub(PERSISTED_NAVIGATION_LIMIT);
        snapshots.drain(..overflow);

        let written = serde_json::to_string(&snapshots)
            .map_err(|e| e.to_string())
            .and_then(|raw| {
                store
                    .set(StorageKeys::NAVIGATION_JOURNAL, &raw)
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = written {
            warn!(error = %e, target = %snapshot.target_path, "failed to persist navigation snapshot");
        }
    }
}

impl TransitionObserver for Journal {
    fn on_transition(&self, record: &TransitionRecord) {
        self.push(JournalEntry::Transition(record.clone()));
    }

    fn on_navigation(&self, snapshot: &NavigationSnapshot) {
        self.persist_navigation(snapshot);
        self.push(JournalEntry::Navigation(snapshot.clone()));
    }
}
