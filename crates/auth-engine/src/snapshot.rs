//! Read-only view of the auth machine published to the rest of the tab.

use crate::error::ErrorCode;
use crate::fsm::AuthState;
use crate::machine::AuthSession;
use crate::status::Identity;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFetchState {
    Refreshing,
    Checking,
    Authenticated,
    Unauthenticated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthSnapshot {
    pub state: AuthState,
    pub session: AuthSession,
    /// Bumped on every successful login, logout or refresh.
    pub signal_epoch: u64,
    /// Bumped on every `background_refreshing -> stable` transition.
    pub resumed_epoch: u64,
}

impl Default for AuthSnapshot {
    fn default() -> Self {
        Self {
            state: AuthState::Uninitialized,
            session: AuthSession::default(),
            signal_epoch: 0,
            resumed_epoch: 0,
        }
    }
}

impl AuthSnapshot {
    /// Settled in either idle state: no actor in flight.
    pub fn is_stable(&self) -> bool {
        matches!(self.state, AuthState::Stable | AuthState::Unauthenticated)
    }

    pub fn is_loading(&self) -> bool {
        !self.is_stable()
    }

    /// Keeps reporting signed in across revalidation, refresh and a client
    /// swap so the UI does not flicker to "logged out".
    pub fn considered_authenticated_for_ui(&self) -> bool {
        self.state.is_idle_authenticated() || self.state == AuthState::ReInitializing
    }

    pub fn is_authenticated(&self) -> bool {
        self.considered_authenticated_for_ui()
    }

    pub fn data_fetch_state(&self) -> DataFetchState {
        match self.state {
            AuthState::InitialRefreshing => DataFetchState::Refreshing,
            AuthState::Checking => DataFetchState::Checking,
            AuthState::Stable
            | AuthState::Revalidating
            | AuthState::BackgroundRefreshing
            | AuthState::EvaluatingInitialSession
            | AuthState::ReInitializing => DataFetchState::Authenticated,
            AuthState::Uninitialized
            | AuthState::Unauthenticated
            | AuthState::LoggingIn
            | AuthState::LoggingOut => DataFetchState::Unauthenticated,
        }
    }

    pub fn login_error(&self) -> Option<LoginError> {
        if self.state != AuthState::Unauthenticated {
            return None;
        }
        match &self.session.error_code {
            Some(code @ ErrorCode::Login(_)) => {
                let code = code.to_string();
                Some(LoginError {
                    message: format!("Login failed: {code}"),
                    code,
                })
            }
            _ => None,
        }
    }

    pub fn user(&self) -> Option<&Identity> {
        self.session.user.as_ref()
    }

    pub fn error_code(&self) -> Option<&ErrorCode> {
        self.session.error_code.as_ref()
    }
}
