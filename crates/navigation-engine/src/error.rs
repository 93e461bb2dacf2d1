//! Navigation error types.

use auth_engine::AuthError;
use session_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NavigationError {
    /// Persisting or reading the last known path failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The auth service could not take the revalidation request
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// The router is no longer accepting navigations
    #[error("Router closed")]
    RouterClosed,
}

impl NavigationError {
    /// Whether the executor loop can no longer make progress.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            NavigationError::RouterClosed | NavigationError::Auth(AuthError::ServiceStopped)
        )
    }
}

pub type NavigationResult<T> = Result<T, NavigationError>;
