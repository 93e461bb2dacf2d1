//! Persistence for the session coordination layer.
//!
//! Two scopes mirror what a browser gives a tab:
//! - an origin-wide store shared by every tab ([`SharedStorage`]) that
//!   notifies other tabs of writes, like `localStorage` plus the `storage` event
//! - a per-tab store (any [`KeyValueStore`]), like `sessionStorage`
//!
//! On top of those sit the two typed values the coordinator persists:
//! [`CrossTabSignal`] and [`LastKnownPathStore`].

mod backends;
mod cross_tab;
mod keys;
mod last_path;
mod shared;
mod traits;

pub use backends::{JsonFileStore, MemoryStore};
pub use cross_tab::CrossTabSignal;
pub use keys::StorageKeys;
pub use last_path::LastKnownPathStore;
pub use shared::{SharedStorage, StorageChange, StorageHandle};
pub use traits::KeyValueStore;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend could not complete the operation
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Stored value could not be decoded
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Backing file is not a JSON object of strings
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
