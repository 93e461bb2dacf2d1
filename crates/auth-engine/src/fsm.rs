//! Auth session state machine using rust-fsm.
//!
//! The nested `idle_authenticated` region is flattened into three states.
//! Guard outcomes of invoked actors (`StatusReceived`, `RefreshRequired`,
//! `SessionActive`, `NoSession`, `RpcFailed`, `LoggedOut`) are fed in as
//! inputs, so the table below is the complete transition relation.
//!
//! ```text
//!  Uninitialized ──ClientReady──► Checking ──StatusReceived──► EvaluatingInitialSession
//!        ▲                           │ RpcFailed                 │ RefreshRequired / SessionActive / NoSession
//!        │ ClientUnready             ▼                           ▼
//!  Unauthenticated ◄──────────────────────────────── InitialRefreshing ──► Stable
//!        │ Login                                                           │ Check / Refresh / Logout
//!        ▼                                                                 ▼
//!    LoggingIn ──SessionActive──► Stable ◄──► Revalidating / BackgroundRefreshing
//!                                   │ ClientUnready
//!                                   ▼
//!                             ReInitializing ──ClientReady──► Checking
//! ```

use rust_fsm::*;
use serde::Serialize;
use std::fmt;

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub auth_session(Uninitialized)

    Uninitialized => {
        ClientReady => Checking,
        ClientUnready => Uninitialized
    },
    ReInitializing => {
        ClientReady => Checking
    },
    Checking => {
        StatusReceived => EvaluatingInitialSession,
        RpcFailed => Unauthenticated
    },
    EvaluatingInitialSession => {
        RefreshRequired => InitialRefreshing,
        SessionActive => Stable,
        NoSession => Unauthenticated
    },
    InitialRefreshing => {
        SessionActive => Stable,
        NoSession => Unauthenticated,
        RpcFailed => Unauthenticated
    },
    Stable => {
        Check => Revalidating,
        Refresh => BackgroundRefreshing,
        Logout => LoggingOut,
        ClientUnready => ReInitializing
    },
    Revalidating => {
        RefreshRequired => BackgroundRefreshing,
        SessionActive => Stable,
        NoSession => Unauthenticated,
        RpcFailed => Unauthenticated,
        Check => Revalidating,
        Refresh => BackgroundRefreshing,
        Logout => LoggingOut,
        ClientUnready => ReInitializing
    },
    BackgroundRefreshing => {
        SessionActive => Stable,
        NoSession => Unauthenticated,
        RpcFailed => Unauthenticated,
        Check => BackgroundRefreshing,
        Refresh => BackgroundRefreshing,
        Logout => LoggingOut,
        ClientUnready => ReInitializing
    },
    Unauthenticated => {
        Check => Checking,
        Login => LoggingIn,
        ClientUnready => Uninitialized,
        AckLogoutCleanup => Unauthenticated
    },
    LoggingIn => {
        SessionActive => Stable,
        RpcFailed => Unauthenticated
    },
    LoggingOut => {
        LoggedOut => Unauthenticated,
        RpcFailed => Stable
    }
}

pub use auth_session::Input as AuthMachineInput;
pub use auth_session::State as AuthMachineState;
pub use auth_session::StateMachine as AuthMachine;

/// Externally visible auth state, with the dotted names used in journal records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AuthState {
    #[serde(rename = "uninitialized")]
    Uninitialized,
    #[serde(rename = "checking")]
    Checking,
    #[serde(rename = "evaluating_initial_session")]
    EvaluatingInitialSession,
    #[serde(rename = "initial_refreshing")]
    InitialRefreshing,
    #[serde(rename = "idle_authenticated.stable")]
    Stable,
    #[serde(rename = "idle_authenticated.revalidating")]
    Revalidating,
    #[serde(rename = "idle_authenticated.background_refreshing")]
    BackgroundRefreshing,
    #[serde(rename = "idle_unauthenticated")]
    Unauthenticated,
    #[serde(rename = "loggingIn")]
    LoggingIn,
    #[serde(rename = "loggingOut")]
    LoggingOut,
    #[serde(rename = "re_initializing")]
    ReInitializing,
}

impl AuthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthState::Uninitialized => "uninitialized",
            AuthState::Checking => "checking",
            AuthState::EvaluatingInitialSession => "evaluating_initial_session",
            AuthState::InitialRefreshing => "initial_refreshing",
            AuthState::Stable => "idle_authenticated.stable",
            AuthState::Revalidating => "idle_authenticated.revalidating",
            AuthState::BackgroundRefreshing => "idle_authenticated.background_refreshing",
            AuthState::Unauthenticated => "idle_unauthenticated",
            AuthState::LoggingIn => "loggingIn",
            AuthState::LoggingOut => "loggingOut",
            AuthState::ReInitializing => "re_initializing",
        }
    }

    /// Any substate of `idle_authenticated`.
    pub fn is_idle_authenticated(&self) -> bool {
        matches!(
            self,
            AuthState::Stable | AuthState::Revalidating | AuthState::BackgroundRefreshing
        )
    }

    /// States with an invoked actor in flight.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AuthState::Checking
                | AuthState::EvaluatingInitialSession
                | AuthState::InitialRefreshing
                | AuthState::Revalidating
                | AuthState::BackgroundRefreshing
                | AuthState::LoggingIn
                | AuthState::LoggingOut
        )
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&AuthMachineState> for AuthState {
    fn from(state: &AuthMachineState) -> Self {
        match state {
            AuthMachineState::Uninitialized => AuthState::Uninitialized,
            AuthMachineState::ReInitializing => AuthState::ReInitializing,
            AuthMachineState::Checking => AuthState::Checking,
            AuthMachineState::EvaluatingInitialSession => AuthState::EvaluatingInitialSession,
            AuthMachineState::InitialRefreshing => AuthState::InitialRefreshing,
            AuthMachineState::Stable => AuthState::Stable,
            AuthMachineState::Revalidating => AuthState::Revalidating,
            AuthMachineState::BackgroundRefreshing => AuthState::BackgroundRefreshing,
            AuthMachineState::Unauthenticated => AuthState::Unauthenticated,
            AuthMachineState::LoggingIn => AuthState::LoggingIn,
            AuthMachineState::LoggingOut => AuthState::LoggingOut,
        }
    }
}
