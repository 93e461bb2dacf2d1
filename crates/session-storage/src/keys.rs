//! Storage key constants.

/// Keys shared with the web frontend's `localStorage`/`sessionStorage`.
pub struct StorageKeys;

impl StorageKeys {
    /// Origin-wide cross-tab signal (millisecond timestamp, decimal string).
    pub const AUTH_CHANGE_TRIGGER: &'static str = "authChangeTrigger";

    /// Per-tab route to return to after logging in.
    pub const LAST_KNOWN_PATH: &'static str = "lastKnownPathBeforeAuthChange";

    /// Per-tab JSON array of the most recent redirect snapshots.
    pub const NAVIGATION_JOURNAL: &'static str = "navigationJournal";
}
