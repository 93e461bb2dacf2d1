//! Time-windowed log of raw RPC responses.
//!
//! Diagnostics only. Nothing in the machine reads it back.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    AuthStatus,
    Refresh,
    Login,
    Logout,
    Canary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseLogEntry {
    pub at: DateTime<Utc>,
    pub kind: RequestKind,
    pub response: Value,
}

/// Entries ordered by insertion time; eviction pops from the front.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeWindowedLog {
    window: Duration,
    capacity: usize,
    entries: VecDeque<ResponseLogEntry>,
}

impl Default for TimeWindowedLog {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_CAPACITY)
    }
}

impl TimeWindowedLog {
    pub fn new(window: Duration, capacity: usize) -> Self {
        Self {
            window,
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn record(&mut self, kind: RequestKind, response: Value) {
        self.record_at(Utc::now(), kind, response);
    }

    /// Insert an entry, first dropping everything older than the window
    /// relative to `at`.
    pub fn record_at(&mut self, at: DateTime<Utc>, kind: RequestKind, response: Value) {
        let window = chrono::Duration::from_std(self.window).unwrap_or(chrono::Duration::MAX);
        let cutoff = at.checked_sub_signed(window);
        if let Some(cutoff) = cutoff {
            while self.entries.front().is_some_and(|e| e.at < cutoff) {
                self.entries.pop_front();
            }
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(ResponseLogEntry { at, kind, response });
    }

    pub fn entries(&self) -> impl Iterator<Item = &ResponseLogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&ResponseLogEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
