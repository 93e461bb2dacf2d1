//! Behavioural tests for the navigation engine.
//!
//! - `scenarios.rs`  - redirect flows through the decision machine, step by step
//! - `properties.rs` - idempotence, the re-entrancy guard and a random context walk
//! - `executor.rs`   - the executor against a memory router and a scripted auth service

mod executor;

use crate::context::{ContextPatch, PendingSideEffect, SideEffectCommand};
use crate::decision::{NavState, NavigationDecisionMachine, NavigationStep, RoutePolicy};

/// A started machine with auth and setup settled at `pathname`.
fn settled(pathname: &str, is_authenticated: bool) -> (NavigationDecisionMachine, NavigationStep) {
    let mut machine = NavigationDecisionMachine::new(RoutePolicy::default());
    machine.start();
    let step = machine.send(
        ContextPatch::default()
            .pathname(pathname)
            .authenticated(is_authenticated)
            .auth_loading(false)
            .auth_stable(true)
            .setup_loading(false),
    );
    (machine, step)
}

fn navigate(target_path: &str) -> SideEffectCommand {
    SideEffectCommand::NavigateAndJournal {
        target_path: target_path.to_string(),
    }
}

fn commands(step: &NavigationStep) -> Vec<SideEffectCommand> {
    step.commands.iter().map(|p| p.command.clone()).collect()
}

fn pending_command(machine: &NavigationDecisionMachine) -> Option<SideEffectCommand> {
    machine.pending().map(|p: &PendingSideEffect| p.command.clone())
}

fn is_waiting(state: &NavState) -> bool {
    matches!(
        state,
        NavState::RedirectingToLogin
            | NavState::RedirectingToSetup
            | NavState::RedirectingFromLogin
            | NavState::ClearingLastKnownPathBeforeRedirect { .. }
    )
}
