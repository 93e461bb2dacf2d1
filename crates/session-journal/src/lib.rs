//! Diagnostics journal for the session machines.
//!
//! Interpreters emit a [`TransitionRecord`] for every committed change and
//! the navigation executor emits a [`NavigationSnapshot`] before every
//! redirect. Where they go is decided by the [`TransitionObserver`]s handed
//! to the interpreters when they are built.
//!
//! Nothing in here feeds back into control flow: dropping every observer
//! leaves the machines' behavior unchanged.

mod journal;
mod observer;
mod record;

pub use journal::{Journal, PERSISTED_NAVIGATION_LIMIT};
pub use observer::{NullObserver, ObserverSet, RecordingObserver, TracingObserver, TransitionObserver};
pub use record::{
    JournalEntry, MachineId, NavigationSnapshot, TransitionRecord, AUTOMATIC_EVENT,
    CONTEXT_UPDATED_EVENT,
};
