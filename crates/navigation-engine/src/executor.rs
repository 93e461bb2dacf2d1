//! Navigation effect executor.
//!
//! The effectful half of navigation: gathers the seven context inputs from
//! the auth snapshot, the setup status, the router and the last-known-path
//! store, pushes a `CONTEXT_UPDATED` to the decision machine whenever one of
//! them changes, and carries out the commands the machine issues.

use crate::context::{ContextPatch, PendingSideEffect, SideEffectCommand};
use crate::decision::{NavState, NavigationDecisionMachine, NavigationStep, RoutePolicy};
use crate::error::{NavigationError, NavigationResult};
use crate::login_ui::{LoginPresentationMachine, LoginUiInputs, LoginView};
use crate::router::Router;
use auth_engine::{AuthHandle, AuthSnapshot, AuthState};
use chrono::Utc;
use serde::Serialize;
use session_journal::{
    MachineId, NavigationSnapshot, ObserverSet, TransitionObserver, TransitionRecord,
};
use session_storage::LastKnownPathStore;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Upper bound on gather/apply rounds per sync. Each round either applies a
/// command or observes its result, so a healthy sync settles in a handful.
const MAX_SETTLE_ROUNDS: usize = 16;

/// Whether first-run setup is still being determined and where it lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupStatus {
    pub is_loading: bool,
    pub setup_path: Option<String>,
}

impl Default for SetupStatus {
    fn default() -> Self {
        Self {
            is_loading: true,
            setup_path: None,
        }
    }
}

impl SetupStatus {
    pub fn ready(setup_path: Option<&str>) -> Self {
        Self {
            is_loading: false,
            setup_path: setup_path.map(str::to_string),
        }
    }
}

/// The exact input set the decision machine depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationInputs {
    pub pathname: String,
    pub is_authenticated: bool,
    pub is_auth_loading: bool,
    pub is_auth_stable: bool,
    pub is_setup_loading: bool,
    pub setup_path: Option<String>,
    pub last_known_path: Option<String>,
}

impl NavigationInputs {
    pub fn new(
        pathname: impl Into<String>,
        auth: &AuthSnapshot,
        setup: &SetupStatus,
        last_known_path: Option<String>,
    ) -> Self {
        Self {
            pathname: pathname.into(),
            is_authenticated: auth.considered_authenticated_for_ui(),
            is_auth_loading: auth.is_loading(),
            is_auth_stable: auth.is_stable(),
            is_setup_loading: setup.is_loading,
            setup_path: setup.setup_path.clone(),
            last_known_path,
        }
    }

    /// Patch carrying only the fields that differ from `previous`, or every
    /// field when there is no previous value.
    pub fn diff(&self, previous: Option<&NavigationInputs>) -> ContextPatch {
        let mut patch = ContextPatch::default();
        let Some(prev) = previous else {
            return ContextPatch {
                pathname: Some(self.pathname.clone()),
                is_authenticated: Some(self.is_authenticated),
                is_auth_loading: Some(self.is_auth_loading),
                is_auth_stable: Some(self.is_auth_stable),
                is_setup_loading: Some(self.is_setup_loading),
                setup_path: Some(self.setup_path.clone()),
                last_known_path: Some(self.last_known_path.clone()),
            };
        };

        if prev.pathname != self.pathname {
            patch.pathname = Some(self.pathname.clone());
        }
        if prev.is_authenticated != self.is_authenticated {
            patch.is_authenticated = Some(self.is_authenticated);
        }
        if prev.is_auth_loading != self.is_auth_loading {
            patch.is_auth_loading = Some(self.is_auth_loading);
        }
        if prev.is_auth_stable != self.is_auth_stable {
            patch.is_auth_stable = Some(self.is_auth_stable);
        }
        if prev.is_setup_loading != self.is_setup_loading {
            patch.is_setup_loading = Some(self.is_setup_loading);
        }
        if prev.setup_path != self.setup_path {
            patch.setup_path = Some(self.setup_path.clone());
        }
        if prev.last_known_path != self.last_known_path {
            patch.last_known_path = Some(self.last_known_path.clone());
        }
        patch
    }
}

/// What the navigation layer currently shows, published after every sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationStatus {
    pub state: NavState,
    pub pending: Option<PendingSideEffect>,
    pub login_view: LoginView,
    pub pathname: String,
}

pub struct NavigationEffectExecutor {
    machine: NavigationDecisionMachine,
    login_ui: LoginPresentationMachine,
    router: Arc<dyn Router>,
    last_path: LastKnownPathStore,
    auth: AuthHandle,
    observers: ObserverSet,
    last_inputs: Option<NavigationInputs>,
    last_applied: u64,
    status: watch::Sender<NavigationStatus>,
}

impl NavigationEffectExecutor {
    pub fn new(
        policy: RoutePolicy,
        router: Arc<dyn Router>,
        last_path: LastKnownPathStore,
        auth: AuthHandle,
        observers: ObserverSet,
    ) -> Self {
        let machine = NavigationDecisionMachine::new(policy);
        let (status, _) = watch::channel(NavigationStatus {
            state: machine.state().clone(),
            pending: None,
            login_view: LoginView::Idle,
            pathname: router.current_pathname(),
        });
        Self {
            machine,
            login_ui: LoginPresentationMachine::new(),
            router,
            last_path,
            auth,
            observers,
            last_inputs: None,
            last_applied: 0,
            status,
        }
    }

    pub fn machine(&self) -> &NavigationDecisionMachine {
        &self.machine
    }

    pub fn login_view(&self) -> LoginView {
        self.login_ui.view()
    }

    pub fn subscribe(&self) -> watch::Receiver<NavigationStatus> {
        self.status.subscribe()
    }

    /// Read the current inputs from their sources.
    pub fn gather(&self, auth: &AuthSnapshot, setup: &SetupStatus) -> NavigationResult<NavigationInputs> {
        Ok(NavigationInputs::new(
            self.router.current_pathname(),
            auth,
            setup,
            self.last_path.get()?,
        ))
    }

    /// Push context and apply issued commands until the inputs stop changing.
    ///
    /// A failed command is logged and the rest of the step still runs; only
    /// fatal errors are returned before the round completes.
    pub async fn sync(&mut self, auth: &AuthSnapshot, setup: &SetupStatus) -> NavigationResult<()> {
        for _ in 0..MAX_SETTLE_ROUNDS {
            let inputs = self.gather(auth, setup)?;
            self.present_login(auth, &inputs);

            let Some(step) = self.push_context(inputs) else {
                self.publish();
                return Ok(());
            };
            for command in &step.commands {
                match self.apply(command).await {
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => warn!(seq = command.seq, error = %e, "side effect failed, continuing"),
                    Ok(()) => {}
                }
            }
        }
        warn!(
            state = %self.machine.state(),
            "navigation did not settle, deferring to the next input change"
        );
        self.publish();
        Ok(())
    }

    /// Send `CONTEXT_UPDATED` if any input changed since the last push.
    pub fn push_context(&mut self, inputs: NavigationInputs) -> Option<NavigationStep> {
        if self.last_inputs.as_ref() == Some(&inputs) {
            return None;
        }
        let patch = inputs.diff(self.last_inputs.as_ref());
        self.last_inputs = Some(inputs);

        let state_before = self.machine.state().as_str();
        let step = self.machine.send(patch);
        self.journal(state_before, &step);
        Some(step)
    }

    /// Carry out one command. Commands at or below the last applied sequence
    /// number are skipped.
    pub async fn apply(&mut self, pending: &PendingSideEffect) -> NavigationResult<()> {
        if pending.seq <= self.last_applied {
            debug!(seq = pending.seq, "side effect already applied");
            return Ok(());
        }
        self.last_applied = pending.seq;

        match &pending.command {
            SideEffectCommand::NavigateAndJournal { target_path } => {
                let from_path = self.router.current_pathname();
                if *target_path == from_path {
                    return Ok(());
                }
                self.observers.on_navigation(&self.snapshot(from_path.clone(), target_path));
                // Let a just-written session cookie land before the request leaves.
                tokio::task::yield_now().await;
                info!(from = %from_path, to = %target_path, "navigating");
                self.router.push(target_path);
            }
            SideEffectCommand::SavePath => {
                let pathname = self.router.current_pathname();
                if !self.machine.policy().is_login(&pathname) {
                    let href = format!("{}{}", pathname, self.router.current_search());
                    debug!(path = %href, "saving last known path");
                    self.last_path.set(Some(&href))?;
                }
            }
            SideEffectCommand::ClearLastKnownPath => {
                self.last_path.set(None)?;
            }
            SideEffectCommand::RevalidateAuth => {
                self.auth.check()?;
            }
        }
        Ok(())
    }

    /// Follow auth, setup and location changes until `shutdown` flips.
    pub async fn run(
        mut self,
        mut setup: watch::Receiver<SetupStatus>,
        mut shutdown: watch::Receiver<bool>,
    ) -> NavigationResult<()> {
        let mut auth = self.auth.subscribe();
        let mut location = self.router.subscribe();

        loop {
            let auth_snapshot = auth.borrow_and_update().clone();
            let setup_status = setup.borrow_and_update().clone();
            location.mark_unchanged();
            match self.sync(&auth_snapshot, &setup_status).await {
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(error = %e, "navigation round failed, waiting for the next change"),
                Ok(()) => {}
            }

            tokio::select! {
                changed = auth.changed() => {
                    if changed.is_err() {
                        debug!("auth service stopped, navigation loop exiting");
                        return Ok(());
                    }
                }
                changed = setup.changed() => {
                    if changed.is_err() {
                        debug!("setup status source dropped, navigation loop exiting");
                        return Ok(());
                    }
                }
                changed = location.changed() => {
                    changed.map_err(|_| NavigationError::RouterClosed)?;
                }
                _ = shutdown.changed() => {
                    debug!("navigation loop shutting down");
                    return Ok(());
                }
            }
        }
    }

    fn present_login(&mut self, auth: &AuthSnapshot, inputs: &NavigationInputs) {
        let before = self.login_ui.view();
        let (after, changed) = self.login_ui.evaluate(LoginUiInputs {
            is_authenticated: inputs.is_authenticated,
            is_logging_in: auth.state == AuthState::LoggingIn,
            is_on_login_page: self.machine.policy().is_login(&inputs.pathname),
        });
        if changed {
            self.observers.on_transition(&TransitionRecord::state_change(
                MachineId::LoginUi,
                before.as_str(),
                after.as_str(),
                Some("EVALUATE"),
            ));
        }
    }

    fn journal(&self, state_before: &str, step: &NavigationStep) {
        for transition in &step.transitions {
            self.observers.on_transition(&TransitionRecord::state_change(
                MachineId::Navigation,
                transition.from,
                transition.to,
                transition.event,
            ));
        }
        if step.transitions.is_empty() && !step.changed_fields.is_empty() {
            self.observers.on_transition(&TransitionRecord::context_change(
                MachineId::Navigation,
                state_before,
                step.changed_fields.clone(),
            ));
        }
    }

    fn snapshot(&self, from_path: String, target_path: &str) -> NavigationSnapshot {
        let ctx = self.machine.context();
        NavigationSnapshot {
            from_path,
            target_path: target_path.to_string(),
            state: self.machine.state().as_str().to_string(),
            is_authenticated: ctx.is_authenticated,
            is_auth_loading: ctx.is_auth_loading,
            last_known_path: ctx.last_known_path.clone(),
            setup_path: ctx.setup_path.clone(),
            at: Utc::now(),
        }
    }

    fn publish(&self) {
        let next = NavigationStatus {
            state: self.machine.state().clone(),
            pending: self.machine.pending().cloned(),
            login_view: self.login_ui.view(),
            pathname: self.router.current_pathname(),
        };
        self.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
