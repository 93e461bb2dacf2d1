//! Navigation decision machine.
//!
//! Pure reducer over [`NavigationContext`]. Every `CONTEXT_UPDATED` either
//! re-enters `evaluating` (no command pending) or only merges the patch and
//! lets the waiting state decide whether its command has resolved. The
//! second path is what keeps a redirect from re-triggering itself while the
//! executor is still carrying it out.

use crate::context::{ContextPatch, NavigationContext, PendingSideEffect, SideEffectCommand};
use serde::Serialize;
use std::fmt;
use tracing::debug;

pub const CONTEXT_UPDATED: &str = "CONTEXT_UPDATED";

/// Routes the machine treats specially.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePolicy {
    pub login_path: String,
    pub home_path: String,
    /// Paths that never trigger a login redirect. Exact matches.
    pub public_paths: Vec<String>,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::new("/login", "/")
    }
}

impl RoutePolicy {
    pub fn new(login_path: impl Into<String>, home_path: impl Into<String>) -> Self {
        let login_path = login_path.into();
        Self {
            public_paths: vec![login_path.clone()],
            login_path,
            home_path: home_path.into(),
        }
    }

    pub fn is_public(&self, pathname: &str) -> bool {
        self.public_paths.iter().any(|p| p == pathname)
    }

    pub fn is_login(&self, pathname: &str) -> bool {
        pathname == self.login_path
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NavState {
    Booting,
    Evaluating,
    Idle,
    SavingPathForLoginRedirect,
    RedirectingToLogin,
    RedirectingToSetup,
    /// Holds the last known path seen on entry; clearing storage must not
    /// lose the redirect target.
    ClearingLastKnownPathBeforeRedirect { retained: Option<String> },
    RedirectingFromLogin,
}

impl NavState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NavState::Booting => "booting",
            NavState::Evaluating => "evaluating",
            NavState::Idle => "idle",
            NavState::SavingPathForLoginRedirect => "savingPathForLoginRedirect",
            NavState::RedirectingToLogin => "redirectingToLogin",
            NavState::RedirectingToSetup => "redirectingToSetup",
            NavState::ClearingLastKnownPathBeforeRedirect { .. } => "clearingLastKnownPathBeforeRedirect",
            NavState::RedirectingFromLogin => "redirectingFromLogin",
        }
    }
}

impl fmt::Display for NavState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavTransition {
    pub from: &'static str,
    pub to: &'static str,
    /// `None` for automatic transitions.
    pub event: Option<&'static str>,
}

/// Result of one run-to-completion step.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NavigationStep {
    pub transitions: Vec<NavTransition>,
    /// Commands issued during the step, in order.
    pub commands: Vec<PendingSideEffect>,
    /// Context fields changed by the event.
    pub changed_fields: Vec<String>,
}

impl NavigationStep {
    pub fn visited(&self) -> Vec<&'static str> {
        self.transitions.iter().map(|t| t.to).collect()
    }
}

#[derive(Debug, Clone)]
pub struct NavigationDecisionMachine {
    policy: RoutePolicy,
    state: NavState,
    context: NavigationContext,
    next_seq: u64,
}

impl NavigationDecisionMachine {
    pub fn new(policy: RoutePolicy) -> Self {
        Self::with_context(policy, NavigationContext::default())
    }

    pub fn with_context(policy: RoutePolicy, context: NavigationContext) -> Self {
        Self {
            policy,
            state: NavState::Booting,
            context,
            next_seq: 1,
        }
    }

    pub fn state(&self) -> &NavState {
        &self.state
    }

    pub fn context(&self) -> &NavigationContext {
        &self.context
    }

    pub fn pending(&self) -> Option<&PendingSideEffect> {
        self.context.pending_side_effect.as_ref()
    }

    pub fn policy(&self) -> &RoutePolicy {
        &self.policy
    }

    /// Leave `booting`. Idempotent.
    pub fn start(&mut self) -> NavigationStep {
        let mut step = NavigationStep::default();
        if self.state == NavState::Booting {
            self.go(NavState::Evaluating, None, &mut step);
        }
        step
    }

    /// `CONTEXT_UPDATED`
    pub fn send(&mut self, patch: ContextPatch) -> NavigationStep {
        let mut step = self.start();
        step.changed_fields = self.context.merge(patch);

        if self.context.pending_side_effect.is_none() {
            self.go(NavState::Evaluating, Some(CONTEXT_UPDATED), &mut step);
            return step;
        }

        if let Some(next) = self.resolved_exit() {
            self.go(next, Some(CONTEXT_UPDATED), &mut step);
        } else {
            debug!(
                state = %self.state,
                changed = ?step.changed_fields,
                "side effect pending, context merged without re-evaluation"
            );
        }
        step
    }

    /// Exit of a waiting state once its command has visibly resolved, or an
    /// escape hatch when auth moved under it.
    fn resolved_exit(&self) -> Option<NavState> {
        let ctx = &self.context;
        match &self.state {
            NavState::RedirectingToLogin if ctx.is_authenticated => Some(NavState::Evaluating),
            NavState::RedirectingToLogin if self.policy.is_login(&ctx.pathname) => Some(NavState::Idle),
            NavState::ClearingLastKnownPathBeforeRedirect { .. } if ctx.last_known_path.is_none() => {
                Some(NavState::RedirectingFromLogin)
            }
            NavState::RedirectingFromLogin if !ctx.is_authenticated => Some(NavState::Evaluating),
            NavState::RedirectingFromLogin if !self.policy.is_login(&ctx.pathname) => Some(NavState::Idle),
            NavState::RedirectingToSetup if !ctx.is_authenticated => Some(NavState::Evaluating),
            NavState::RedirectingToSetup if ctx.pathname != self.policy.home_path => {
                Some(NavState::Evaluating)
            }
            _ => None,
        }
    }

    fn go(&mut self, next: NavState, event: Option<&'static str>, step: &mut NavigationStep) {
        let previous = std::mem::replace(&mut self.state, next.clone());
        step.transitions.push(NavTransition {
            from: previous.as_str(),
            to: next.as_str(),
            event,
        });
        self.enter(previous, step);
    }

    fn issue(&mut self, command: SideEffectCommand, step: &mut NavigationStep) {
        let pending = PendingSideEffect {
            seq: self.next_seq,
            command,
        };
        self.next_seq += 1;
        step.commands.push(pending.clone());
        self.context.pending_side_effect = Some(pending);
    }

    fn enter(&mut self, previous: NavState, step: &mut NavigationStep) {
        match self.state.clone() {
            NavState::Booting => {}
            NavState::Evaluating => {
                self.context.pending_side_effect = None;
                let next = self.evaluate();
                self.go(next, None, step);
            }
            NavState::Idle => {
                self.context.pending_side_effect = None;
            }
            NavState::SavingPathForLoginRedirect => {
                self.issue(SideEffectCommand::SavePath, step);
                self.go(NavState::RedirectingToLogin, None, step);
            }
            NavState::RedirectingToLogin => {
                let target_path = self.policy.login_path.clone();
                self.issue(SideEffectCommand::NavigateAndJournal { target_path }, step);
            }
            NavState::ClearingLastKnownPathBeforeRedirect { .. } => {
                if self.context.last_known_path.is_none() {
                    self.go(NavState::RedirectingFromLogin, None, step);
                } else {
                    self.issue(SideEffectCommand::ClearLastKnownPath, step);
                }
            }
            NavState::RedirectingFromLogin => {
                let retained = match previous {
                    NavState::ClearingLastKnownPathBeforeRedirect { retained } => retained,
                    _ => None,
                };
                let target_path = self.login_exit_target(retained);
                self.issue(SideEffectCommand::NavigateAndJournal { target_path }, step);
            }
            NavState::RedirectingToSetup => match self.context.setup_path.clone() {
                Some(target_path) => {
                    self.issue(SideEffectCommand::NavigateAndJournal { target_path }, step)
                }
                None => self.go(NavState::Evaluating, None, step),
            },
        }
    }

    /// Ordered guards of `evaluating`; first match wins.
    fn evaluate(&self) -> NavState {
        let ctx = &self.context;
        let settled = !ctx.is_auth_loading;

        if !ctx.is_authenticated && settled && !self.policy.is_public(&ctx.pathname) {
            NavState::SavingPathForLoginRedirect
        } else if ctx.is_authenticated
            && settled
            && !ctx.is_setup_loading
            && self.policy.is_login(&ctx.pathname)
        {
            NavState::ClearingLastKnownPathBeforeRedirect {
                retained: ctx.last_known_path.clone(),
            }
        } else if ctx.is_authenticated
            && settled
            && ctx.pathname == self.policy.home_path
            && ctx.setup_path.is_some()
        {
            NavState::RedirectingToSetup
        } else {
            NavState::Idle
        }
    }

    /// `setupPath ?? retained ?? lastKnownPath ?? home`, never the login page.
    fn login_exit_target(&self, retained: Option<String>) -> String {
        let target = self
            .context
            .setup_path
            .clone()
            .or(retained)
            .or_else(|| self.context.last_known_path.clone())
            .unwrap_or_else(|| self.policy.home_path.clone());
        if self.policy.is_login(&target) {
            self.policy.home_path.clone()
        } else {
            target
        }
    }
}
