//! Navigation decisions and their execution.
//!
//! [`NavigationDecisionMachine`] is a pure reducer that decides where a tab
//! should be given auth and setup state; [`NavigationEffectExecutor`] feeds it
//! context and performs the commands it issues against a [`Router`] and the
//! persisted last known path. [`LoginPresentationMachine`] picks what the
//! login page renders.

pub mod context;
pub mod decision;
pub mod error;
pub mod executor;
pub mod login_ui;
pub mod router;

#[cfg(test)]
mod tests;

pub use context::{ContextPatch, NavigationContext, PendingSideEffect, SideEffectCommand};
pub use decision::{
    NavState, NavTransition, NavigationDecisionMachine, NavigationStep, RoutePolicy, CONTEXT_UPDATED,
};
pub use error::{NavigationError, NavigationResult};
pub use executor::{NavigationEffectExecutor, NavigationInputs, NavigationStatus, SetupStatus};
pub use login_ui::{LoginPresentationMachine, LoginUiInputs, LoginView};
pub use router::{Location, MemoryRouter, Router};
