//! Proactive refresh scheduling.

use auth_engine::{AuthSnapshot, AuthState};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Time until a refresh should fire for a token expiring at `expires_at`.
///
/// Zero when the refresh point has already passed.
pub fn refresh_delay(expires_at: DateTime<Utc>, now: DateTime<Utc>, margin: Duration) -> Duration {
    let margin = chrono::Duration::from_std(margin).unwrap_or(chrono::Duration::MAX);
    let fire_at = expires_at
        .checked_sub_signed(margin)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    (fire_at - now).to_std().unwrap_or(Duration::ZERO)
}

/// Expiry a refresh should be scheduled for, if any.
///
/// Only a `stable` session with a known expiry qualifies; every other state
/// either has a refresh in flight or nothing to refresh.
pub fn refresh_target(snapshot: &AuthSnapshot) -> Option<DateTime<Utc>> {
    if snapshot.state != AuthState::Stable {
        return None;
    }
    snapshot.session.token_expires_at
}
