//! Observer contracts.
//!
//! Interpreters take their observers at construction time. Observers see
//! every committed transition but cannot influence it: callbacks return
//! nothing and a misbehaving observer only loses its own data.

use crate::{JournalEntry, NavigationSnapshot, TransitionRecord};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Receives transition records from the session machines.
pub trait TransitionObserver: Send + Sync {
    /// Called after a transition has been committed.
    fn on_transition(&self, record: &TransitionRecord);

    /// Called right before the navigation executor changes the route.
    fn on_navigation(&self, _snapshot: &NavigationSnapshot) {}
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullObserver;

impl TransitionObserver for NullObserver {
    fn on_transition(&self, _record: &TransitionRecord) {}
}

/// Logs every record at `debug`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl TransitionObserver for TracingObserver {
    fn on_transition(&self, record: &TransitionRecord) {
        debug!(
            machine = %record.machine,
            from = %record.from,
            to = %record.to,
            event = %record.event,
            "{}",
            record.reason
        );
    }

    fn on_navigation(&self, snapshot: &NavigationSnapshot) {
        debug!(
            from = %snapshot.from_path,
            to = %snapshot.target_path,
            state = %snapshot.state,
            "navigating"
        );
    }
}

/// Records everything, for tests.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    entries: Mutex<Vec<JournalEntry>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().clone()
    }

    /// Only the transition records, in order.
    pub fn transitions(&self) -> Vec<TransitionRecord> {
        self.entries
            .lock()
            .iter()
            .filter_map(|e| match e {
                JournalEntry::Transition(r) => Some(r.clone()),
                JournalEntry::Navigation(_) => None,
            })
            .collect()
    }

    /// `to` state of every state-changing record, in order.
    pub fn visited(&self) -> Vec<String> {
        self.transitions()
            .into_iter()
            .filter(|r| r.from != r.to)
            .map(|r| r.to)
            .collect()
    }

    pub fn navigations(&self) -> Vec<NavigationSnapshot> {
        self.entries
            .lock()
            .iter()
            .filter_map(|e| match e {
                JournalEntry::Navigation(s) => Some(s.clone()),
                JournalEntry::Transition(_) => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TransitionObserver for RecordingObserver {
    fn on_transition(&self, record: &TransitionRecord) {
        self.entries
            .lock()
            .push(JournalEntry::Transition(record.clone()));
    }

    fn on_navigation(&self, snapshot: &NavigationSnapshot) {
        self.entries
            .lock()
            .push(JournalEntry::Navigation(snapshot.clone()));
    }
}

/// Fans records out to several observers in registration order.
#[derive(Clone, Default)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn TransitionObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn TransitionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn push(&mut self, observer: Arc<dyn TransitionObserver>) {
        self.observers.push(observer);
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl TransitionObserver for ObserverSet {
    fn on_transition(&self, record: &TransitionRecord) {
        for observer in &self.observers {
            observer.on_transition(record);
        }
    }

    fn on_navigation(&self, snapshot: &NavigationSnapshot) {
        for observer in &self.observers {
            observer.on_navigation(snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MachineId;

    fn record(to: &str) -> TransitionRecord {
        TransitionRecord::state_change(MachineId::Auth, "checking", to, None)
    }

    #[test]
    fn recording_observer_records_in_order() {
        let observer = RecordingObserver::new();
        assert!(observer.is_empty());

        observer.on_transition(&record("evaluating_initial_session"));
        observer.on_transition(&record("idle_unauthenticated"));

        assert_eq!(
            observer.visited(),
            vec!["evaluating_initial_session", "idle_unauthenticated"]
        );
        observer.clear();
        assert!(observer.is_empty());
    }

    #[test]
    fn observer_set_fans_out() {
        let a = Arc::new(RecordingObserver::new());
        let b = Arc::new(RecordingObserver::new());
        let set = ObserverSet::new()
            .with(a.clone())
            .with(b.clone())
            .with(Arc::new(NullObserver));

        set.on_transition(&record("idle_unauthenticated"));

        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }
}
