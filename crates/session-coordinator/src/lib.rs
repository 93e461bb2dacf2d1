//! Per-tab session coordination.
//!
//! Wires the auth engine, the navigation engine and the shared storage of an
//! origin into a [`TabSession`], and keeps tabs of the same origin in step
//! through the [`CrossTabAuthSynchronizer`].

pub mod cross_tab;
pub mod error;
pub mod hooks;
pub mod refresh;
pub mod tab;

pub use cross_tab::{CrossTabAuthSynchronizer, SyncAction, SyncInputs};
pub use error::{CoordinatorError, CoordinatorResult};
pub use hooks::{NoopHooks, SessionHooks};
pub use refresh::{refresh_delay, refresh_target};
pub use tab::{TabConfig, TabSession, TabSessionBuilder};
