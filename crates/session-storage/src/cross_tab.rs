//! The persisted cross-tab auth signal.

use crate::{KeyValueStore, StorageKeys, StorageResult};
use std::sync::Arc;
use tracing::warn;

/// Monotonically increasing timestamp under [`StorageKeys::AUTH_CHANGE_TRIGGER`].
///
/// Any tab bumps it after a successful login, logout or refresh; other tabs
/// revalidate when they see a value greater than the last one they handled.
#[derive(Clone)]
pub struct CrossTabSignal {
    store: Arc<dyn KeyValueStore>,
}

impl CrossTabSignal {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Current signal; 0 when unset or unreadable.
    pub fn read(&self) -> StorageResult<u64> {
        let raw = self.store.get(StorageKeys::AUTH_CHANGE_TRIGGER)?;
        Ok(raw.as_deref().map(parse_signal).unwrap_or(0))
    }

    /// Publish a change at wall-clock time.
    pub fn publish(&self) -> StorageResult<u64> {
        self.publish_at(now_millis())
    }

    /// Publish a change at `now_ms`.
    ///
    /// The written value is `max(now_ms, current + 1)` so the signal strictly
    /// increases even when clocks disagree or two writes share a millisecond.
    pub fn publish_at(&self, now_ms: u64) -> StorageResult<u64> {
        let next = now_ms.max(self.read()?.saturating_add(1));
        self.store
            .set(StorageKeys::AUTH_CHANGE_TRIGGER, &next.to_string())?;
        Ok(next)
    }
}

/// Parse a raw stored value; garbage reads as 0 so it never blocks newer writes.
fn parse_signal(raw: &str) -> u64 {
    match raw.trim().parse::<u64>() {
        Ok(value) => value,
        Err(_) => {
            warn!(value = %raw, "ignoring unparsable cross-tab signal");
            0
        }
    }
}

fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}
