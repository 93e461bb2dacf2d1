//! Pure auth session reducer.
//!
//! [`AuthSessionMachine`] owns the FSM, the [`AuthSession`] context and the
//! attached [`SessionClient`]. It never performs I/O: entering a state that
//! invokes an actor yields an [`Invocation`] in the returned [`Step`], and
//! the interpreter feeds the result back through [`AuthSessionMachine::complete`].
//!
//! Each invocation carries an id. Leaving the state that started it clears
//! the active id, so a late completion is recognised as stale and dropped.

use crate::coalesce::SessionClient;
use crate::error::{ErrorCode, GatewayError};
use crate::fsm::{AuthMachine, AuthMachineInput, AuthState};
use crate::gateway::{ConfirmedReply, RpcReply};
use crate::response_log::{RequestKind, TimeWindowedLog};
use crate::status::{AuthStatus, Credentials, Identity};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Authentication context. Only the machine's own transitions mutate it.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AuthSession {
    pub is_authenticated: bool,
    pub user: Option<Identity>,
    pub expired_access_token_call_refresh: bool,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub error_code: Option<ErrorCode>,
    /// One-shot flag consumed by logout cleanup, cleared by `ACK_LOGOUT_CLEANUP`.
    pub just_logged_out: bool,
    #[serde(skip)]
    pub response_log: TimeWindowedLog,
}

impl AuthSession {
    fn merge(&mut self, status: &AuthStatus) {
        self.is_authenticated = status.is_authenticated;
        self.user = status.user.clone();
        self.expired_access_token_call_refresh = status.expired_access_token_call_refresh;
        self.token_expires_at = status.token_expires_at;
        self.error_code = None;
    }

    fn downgrade(&mut self) {
        self.is_authenticated = false;
        self.user = None;
        self.expired_access_token_call_refresh = false;
        self.token_expires_at = None;
    }

    fn reset(&mut self) {
        let response_log = std::mem::take(&mut self.response_log);
        *self = AuthSession {
            response_log,
            ..AuthSession::default()
        };
    }
}

#[derive(Debug, Clone)]
pub enum AuthEvent {
    ClientReady(SessionClient),
    ClientUnready,
    Check,
    Refresh,
    Login(Credentials),
    Logout,
    AckLogoutCleanup,
}

impl AuthEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::ClientReady(_) => "CLIENT_READY",
            AuthEvent::ClientUnready => "CLIENT_UNREADY",
            AuthEvent::Check => "CHECK",
            AuthEvent::Refresh => "REFRESH",
            AuthEvent::Login(_) => "LOGIN",
            AuthEvent::Logout => "LOGOUT",
            AuthEvent::AckLogoutCleanup => "ACK_LOGOUT_CLEANUP",
        }
    }

    fn input(&self) -> AuthMachineInput {
        match self {
            AuthEvent::ClientReady(_) => AuthMachineInput::ClientReady,
            AuthEvent::ClientUnready => AuthMachineInput::ClientUnready,
            AuthEvent::Check => AuthMachineInput::Check,
            AuthEvent::Refresh => AuthMachineInput::Refresh,
            AuthEvent::Login(_) => AuthMachineInput::Login,
            AuthEvent::Logout => AuthMachineInput::Logout,
            AuthEvent::AckLogoutCleanup => AuthMachineInput::AckLogoutCleanup,
        }
    }
}

/// Async operation a state asks the interpreter to run.
#[derive(Debug, Clone, PartialEq)]
pub enum ActorRequest {
    CheckStatus,
    RefreshAndCanary,
    LoginAndCanary(Credentials),
    Logout,
}

impl ActorRequest {
    pub fn name(&self) -> &'static str {
        match self {
            ActorRequest::CheckStatus => "checkStatus",
            ActorRequest::RefreshAndCanary => "refreshAndCanary",
            ActorRequest::LoginAndCanary(_) => "loginAndCanary",
            ActorRequest::Logout => "logout",
        }
    }

    fn failed(&self, error: GatewayError) -> ActorOutcome {
        match self {
            ActorRequest::CheckStatus => ActorOutcome::Status(Err(error)),
            ActorRequest::RefreshAndCanary => ActorOutcome::Refreshed(Err(error)),
            ActorRequest::LoginAndCanary(_) => ActorOutcome::LoggedIn(Err(error)),
            ActorRequest::Logout => ActorOutcome::LoggedOut(Err(error)),
        }
    }
}

pub type InvocationId = u64;

#[derive(Debug, Clone)]
pub struct Invocation {
    pub id: InvocationId,
    pub request: ActorRequest,
    pub client: SessionClient,
}

#[derive(Debug, Clone)]
pub enum ActorOutcome {
    Status(Result<RpcReply, GatewayError>),
    Refreshed(Result<ConfirmedReply, GatewayError>),
    LoggedIn(Result<ConfirmedReply, GatewayError>),
    LoggedOut(Result<RpcReply, GatewayError>),
}

impl ActorOutcome {
    fn actor(&self) -> &'static str {
        match self {
            ActorOutcome::Status(_) => "checkStatus",
            ActorOutcome::Refreshed(_) => "refreshAndCanary",
            ActorOutcome::LoggedIn(_) => "loginAndCanary",
            ActorOutcome::LoggedOut(_) => "logout",
        }
    }

    fn is_ok(&self) -> bool {
        match self {
            ActorOutcome::Status(r) | ActorOutcome::LoggedOut(r) => r.is_ok(),
            ActorOutcome::Refreshed(r) | ActorOutcome::LoggedIn(r) => r.is_ok(),
        }
    }

    /// `done.invoke.<actor>` or `error.invoke.<actor>`.
    pub fn event_name(&self) -> String {
        let kind = if self.is_ok() { "done" } else { "error" };
        format!("{kind}.invoke.{}", self.actor())
    }
}

#[derive(Debug, Clone)]
pub struct ActorCompletion {
    pub invocation: InvocationId,
    pub outcome: ActorOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: AuthState,
    pub to: AuthState,
    /// `None` for automatic transitions.
    pub event: Option<String>,
}

/// Everything one run-to-completion step produced.
#[derive(Debug, Default)]
pub struct Step {
    pub transitions: Vec<Transition>,
    pub invoke: Option<Invocation>,
    /// A canary call completed as part of the resolved actor.
    pub canary_confirmed: bool,
    /// Login, logout or refresh succeeded; other tabs should revalidate.
    pub signal_change: bool,
}

impl Step {
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty() && self.invoke.is_none() && !self.canary_confirmed
    }

    pub fn entered(&self, state: AuthState) -> bool {
        self.transitions.iter().any(|t| t.to == state)
    }
}

pub struct AuthSessionMachine {
    fsm: AuthMachine,
    session: AuthSession,
    client: Option<SessionClient>,
    pending_credentials: Option<Credentials>,
    active: Option<InvocationId>,
    next_invocation: InvocationId,
}

impl Default for AuthSessionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthSessionMachine {
    pub fn new() -> Self {
        Self::with_response_log(TimeWindowedLog::default())
    }

    pub fn with_response_log(response_log: TimeWindowedLog) -> Self {
        Self {
            fsm: AuthMachine::new(),
            session: AuthSession {
                response_log,
                ..AuthSession::default()
            },
            client: None,
            pending_credentials: None,
            active: None,
            next_invocation: 1,
        }
    }

    pub fn state(&self) -> AuthState {
        AuthState::from(self.fsm.state())
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn client(&self) -> Option<&SessionClient> {
        self.client.as_ref()
    }

    pub fn active_invocation(&self) -> Option<InvocationId> {
        self.active
    }

    /// Process an external event.
    pub fn handle(&mut self, event: AuthEvent) -> Step {
        let mut step = Step::default();
        let name = event.name();
        let Some((from, to)) = self.fire(event.input(), Some(name.to_string()), &mut step) else {
            debug!(event = name, state = %self.state(), "event ignored in current state");
            return step;
        };

        match event {
            AuthEvent::ClientReady(client) => {
                debug!(client = client.id(), "rpc client attached");
                self.client = Some(client);
            }
            AuthEvent::ClientUnready => {
                self.client = None;
                if to == AuthState::Uninitialized {
                    self.session.reset();
                    self.pending_credentials = None;
                }
            }
            AuthEvent::Login(credentials) => {
                self.session.error_code = None;
                self.pending_credentials = Some(credentials);
            }
            AuthEvent::AckLogoutCleanup => {
                self.session.just_logged_out = false;
            }
            AuthEvent::Check | AuthEvent::Refresh | AuthEvent::Logout => {}
        }

        if from != to {
            self.enter(to, &mut step);
        }
        step
    }

    /// Resolve an actor. Completions for any invocation other than the
    /// active one are dropped.
    pub fn complete(&mut self, completion: ActorCompletion) -> Step {
        let mut step = Step::default();
        if self.active != Some(completion.invocation) {
            debug!(
                invocation = completion.invocation,
                active = ?self.active,
                "dropping stale actor completion"
            );
            return step;
        }
        self.active = None;
        self.resolve(completion.outcome, &mut step);
        step
    }

    fn fire(
        &mut self,
        input: AuthMachineInput,
        event: Option<String>,
        step: &mut Step,
    ) -> Option<(AuthState, AuthState)> {
        let from = self.state();
        self.fsm.consume(&input).ok()?;
        let to = self.state();
        if from != to {
            step.transitions.push(Transition { from, to, event });
        }
        Some((from, to))
    }

    /// Follow a guard or actor outcome and run the entry of the new state.
    fn follow(&mut self, input: AuthMachineInput, event: Option<String>, step: &mut Step) {
        match self.fire(input.clone(), event, step) {
            Some((from, to)) if from != to => self.enter(to, step),
            Some(_) => {}
            None => warn!(?input, state = %self.state(), "invalid auth state transition"),
        }
    }

    fn enter(&mut self, state: AuthState, step: &mut Step) {
        self.active = None;
        step.invoke = None;

        match state {
            AuthState::Checking | AuthState::Revalidating => self.start(ActorRequest::CheckStatus, step),
            AuthState::InitialRefreshing | AuthState::BackgroundRefreshing => {
                self.start(ActorRequest::RefreshAndCanary, step)
            }
            AuthState::LoggingIn => match self.pending_credentials.take() {
                Some(credentials) => self.start(ActorRequest::LoginAndCanary(credentials), step),
                None => self.follow(AuthMachineInput::RpcFailed, None, step),
            },
            AuthState::LoggingOut => self.start(ActorRequest::Logout, step),
            AuthState::EvaluatingInitialSession => {
                let input = if self.session.expired_access_token_call_refresh {
                    AuthMachineInput::RefreshRequired
                } else if self.session.is_authenticated {
                    AuthMachineInput::SessionActive
                } else {
                    AuthMachineInput::NoSession
                };
                self.follow(input, None, step);
            }
            AuthState::Uninitialized
            | AuthState::ReInitializing
            | AuthState::Stable
            | AuthState::Unauthenticated => {}
        }
    }

    fn start(&mut self, request: ActorRequest, step: &mut Step) {
        let Some(client) = self.client.clone() else {
            warn!(actor = request.name(), "no rpc client attached");
            let outcome = request.failed(GatewayError::ClientUnavailable);
            self.resolve(outcome, step);
            return;
        };
        let id = self.next_invocation;
        self.next_invocation += 1;
        self.active = Some(id);
        debug!(actor = request.name(), invocation = id, "invoking actor");
        step.invoke = Some(Invocation { id, request, client });
    }

    fn resolve(&mut self, outcome: ActorOutcome, step: &mut Step) {
        let event = Some(outcome.event_name());
        let state = self.state();

        match (state, outcome) {
            (AuthState::Checking, ActorOutcome::Status(Ok(reply))) => {
                self.session.response_log.record(RequestKind::AuthStatus, reply.raw);
                self.session.merge(&reply.status);
                self.follow(AuthMachineInput::StatusReceived, event, step);
            }
            (AuthState::Checking, ActorOutcome::Status(Err(e))) => {
                warn!(error = %e, "auth status check failed");
                self.fail(ErrorCode::RpcError, event, step);
            }

            (AuthState::Revalidating, ActorOutcome::Status(Ok(reply))) => {
                if reply.status.expired_access_token_call_refresh {
                    // Context stays as it was until the refresh resolves.
                    debug!("revalidation requires refresh");
                    self.follow(AuthMachineInput::RefreshRequired, event, step);
                } else if reply.status.is_authenticated {
                    self.session.response_log.record(RequestKind::AuthStatus, reply.raw);
                    self.session.merge(&reply.status);
                    self.follow(AuthMachineInput::SessionActive, event, step);
                } else {
                    self.session.response_log.record(RequestKind::AuthStatus, reply.raw);
                    self.session.merge(&reply.status);
                    self.session.downgrade();
                    info!("session no longer authenticated");
                    self.follow(AuthMachineInput::NoSession, event, step);
                }
            }
            (AuthState::Revalidating, ActorOutcome::Status(Err(e))) => {
                warn!(error = %e, "auth revalidation failed");
                self.fail(ErrorCode::RpcError, event, step);
            }

            (AuthState::InitialRefreshing, ActorOutcome::Refreshed(result)) => {
                self.resolve_refresh(result, ErrorCode::InitialRefreshFailed, event, step);
            }
            (AuthState::BackgroundRefreshing, ActorOutcome::Refreshed(result)) => {
                self.resolve_refresh(result, ErrorCode::BackgroundRefreshFailed, event, step);
            }

            (AuthState::LoggingIn, ActorOutcome::LoggedIn(Ok(confirmed))) => {
                self.record_confirmed(RequestKind::Login, &confirmed, step);
                if confirmed.reply.status.is_authenticated {
                    self.session.merge(&confirmed.reply.status);
                    step.signal_change = true;
                    info!("login succeeded");
                    self.follow(AuthMachineInput::SessionActive, event, step);
                } else {
                    let code = ErrorCode::login(confirmed.reply.status.error_code.as_deref());
                    self.fail(code, event, step);
                }
            }
            (AuthState::LoggingIn, ActorOutcome::LoggedIn(Err(e))) => {
                warn!(error = %e, "login failed");
                if let GatewayError::Rejected { payload: Some(payload), .. } = &e {
                    self.session.merge(&AuthStatus::from(payload.clone()));
                }
                self.fail(ErrorCode::login(e.server_error_code()), event, step);
            }

            (AuthState::LoggingOut, ActorOutcome::LoggedOut(Ok(reply))) => {
                self.session.response_log.record(RequestKind::Logout, reply.raw);
                self.session.merge(&reply.status);
                self.session.downgrade();
                self.session.just_logged_out = true;
                step.signal_change = true;
                info!("logged out");
                self.follow(AuthMachineInput::LoggedOut, event, step);
            }
            (AuthState::LoggingOut, ActorOutcome::LoggedOut(Err(e))) => {
                // The session is presumed unchanged; stay authenticated.
                warn!(error = %e, "logout failed");
                self.session.error_code = Some(ErrorCode::LogoutError);
                self.follow(AuthMachineInput::RpcFailed, event, step);
            }

            (state, outcome) => {
                debug!(%state, actor = outcome.actor(), "actor outcome does not apply to state");
            }
        }
    }

    fn resolve_refresh(
        &mut self,
        result: Result<ConfirmedReply, GatewayError>,
        failure: ErrorCode,
        event: Option<String>,
        step: &mut Step,
    ) {
        match result {
            Ok(confirmed) => {
                self.record_confirmed(RequestKind::Refresh, &confirmed, step);
                self.session.merge(&confirmed.reply.status);
                if confirmed.reply.status.is_authenticated {
                    step.signal_change = true;
                    info!("session refreshed");
                    self.follow(AuthMachineInput::SessionActive, event, step);
                } else {
                    self.session.downgrade();
                    if failure == ErrorCode::InitialRefreshFailed {
                        self.session.error_code = Some(failure);
                    }
                    info!("refresh returned no session");
                    self.follow(AuthMachineInput::NoSession, event, step);
                }
            }
            Err(e) => {
                warn!(error = %e, code = %failure, "refresh failed");
                if let GatewayError::Rejected { payload: Some(payload), .. } = &e {
                    self.session.merge(&AuthStatus::from(payload.clone()));
                }
                self.fail(failure, event, step);
            }
        }
    }

    fn record_confirmed(&mut self, kind: RequestKind, confirmed: &ConfirmedReply, step: &mut Step) {
        self.session.response_log.record(kind, confirmed.reply.raw.clone());
        self.session
            .response_log
            .record(RequestKind::Canary, confirmed.canary.clone());
        step.canary_confirmed = true;
    }

    /// Failure path into `idle_unauthenticated`: context is downgraded in the
    /// same step so it never contradicts the state.
    fn fail(&mut self, code: ErrorCode, event: Option<String>, step: &mut Step) {
        self.session.downgrade();
        self.session.error_code = Some(code);
        self.follow(AuthMachineInput::RpcFailed, event, step);
    }
}
