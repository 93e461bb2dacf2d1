//! Callbacks the tab runs at session boundaries.

use async_trait::async_trait;

/// Integration points for data layers that cache per-user state.
///
/// Both callbacks run on the tab's coordination task; the machine waits for
/// `on_logged_out` before it acknowledges the logout cleanup.
#[async_trait]
pub trait SessionHooks: Send + Sync {
    /// The user logged out in this tab. Drop anything user-specific.
    async fn on_logged_out(&self) {}

    /// A background refresh brought the session back to `stable`.
    async fn on_session_resumed(&self) {}
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

#[async_trait]
impl SessionHooks for NoopHooks {}
