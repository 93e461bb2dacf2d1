//! Auth session engine.
//!
//! A pure [`AuthSessionMachine`] driven by a tokio interpreter ([`AuthService`]),
//! the [`AuthGateway`] surface it invokes, canary-confirmed refresh and login,
//! and refresh coalescing shared by every caller in a tab.
//!
//! ```text
//! AuthHandle ──events──► Interpreter ──Invocation──► actor task ──► AuthGateway
//!      ▲                     │  ▲                                      │
//!      └──watch<AuthSnapshot>┘  └──────────── ActorCompletion ◄────────┘
//! ```

pub mod coalesce;
pub mod error;
pub mod fsm;
pub mod gateway;
pub mod http_gateway;
pub mod machine;
pub mod response_log;
pub mod service;
pub mod snapshot;
pub mod status;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(test)]
mod tests;

pub use coalesce::{RefreshCoalescer, SessionClient};
pub use error::{AuthError, AuthResult, ErrorCode, GatewayError};
pub use fsm::AuthState;
pub use gateway::{login_and_canary, refresh_and_canary, AuthGateway, ConfirmedReply, RpcReply};
pub use http_gateway::HttpAuthGateway;
pub use machine::{
    ActorCompletion, ActorOutcome, ActorRequest, AuthEvent, AuthSession, AuthSessionMachine,
    Invocation, InvocationId, Step, Transition,
};
pub use response_log::{RequestKind, ResponseLogEntry, TimeWindowedLog};
pub use service::{AuthHandle, AuthService, AuthServiceConfig, DEFAULT_RPC_TIMEOUT};
pub use snapshot::{AuthSnapshot, DataFetchState, LoginError};
pub use status::{AuthStatus, Credentials, Identity, StatusPayload};
