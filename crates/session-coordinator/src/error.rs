//! Coordinator error types.

use auth_engine::AuthError;
use navigation_engine::NavigationError;
use session_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A tab task panicked or was aborted
    #[error("Tab task failed: {0}")]
    Task(String),
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
