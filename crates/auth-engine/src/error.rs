//! Authentication error types.

use crate::status::StatusPayload;
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single gateway call.
///
/// `Clone` so every waiter on a coalesced refresh can receive the same error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// Connection-level failure (DNS, TLS, reset)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Server answered with a non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Server answered but refused the operation (bad credentials, no session)
    #[error("Rejected by server: {}", error_code.as_deref().unwrap_or("no error code"))]
    Rejected {
        error_code: Option<String>,
        payload: Option<StatusPayload>,
    },

    /// Canary call after refresh/login failed
    #[error("Canary request failed: {0}")]
    Canary(String),

    /// Call exceeded the configured RPC bound
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Response body was not the expected shape
    #[error("Malformed response: {0}")]
    Decode(String),

    /// No RPC client is attached to the machine
    #[error("RPC client unavailable")]
    ClientUnavailable,
}

impl GatewayError {
    /// Returns true if retrying the same call could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Transport(_) | GatewayError::Timeout(_) => true,
            GatewayError::Status { status, .. } => *status >= 500,
            GatewayError::Canary(_) => true,
            _ => false,
        }
    }

    /// Server error code carried by a rejection, if any.
    pub fn server_error_code(&self) -> Option<&str> {
        match self {
            GatewayError::Rejected { error_code, .. } => error_code.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            GatewayError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            GatewayError::Status {
                status: status.as_u16(),
                body: e.to_string(),
            }
        } else {
            GatewayError::Transport(e.to_string())
        }
    }
}

/// Error recorded on the session after a failed operation.
///
/// The closed set of values a UI ever sees in `errorCode`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    /// Status check failed at transport or server level
    RpcError,
    InitialRefreshFailed,
    BackgroundRefreshFailed,
    /// Login refused; holds the server code or `UNKNOWN_FAILURE`
    Login(String),
    LogoutError,
}

impl ErrorCode {
    pub const LOGIN_PREFIX: &'static str = "LOGIN_";
    pub const UNKNOWN_LOGIN_FAILURE: &'static str = "UNKNOWN_FAILURE";

    /// Login failure from an optional server code.
    pub fn login(server_code: Option<&str>) -> Self {
        let code = server_code
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(Self::UNKNOWN_LOGIN_FAILURE);
        ErrorCode::Login(code.to_string())
    }

    pub fn is_login_failure(&self) -> bool {
        matches!(self, ErrorCode::Login(_))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::RpcError => f.write_str("RPC_ERROR"),
            ErrorCode::InitialRefreshFailed => f.write_str("INITIAL_REFRESH_FAILED"),
            ErrorCode::BackgroundRefreshFailed => f.write_str("BACKGROUND_REFRESH_FAILED"),
            ErrorCode::Login(code) => write!(f, "{}{}", Self::LOGIN_PREFIX, code),
            ErrorCode::LogoutError => f.write_str("LOGOUT_ERROR"),
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Errors surfaced by the auth service handle.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The interpreter task has exited
    #[error("Auth service is not running")]
    ServiceStopped,

    /// Invalid state transition in the auth FSM
    #[error("Invalid auth state transition: {0}")]
    InvalidStateTransition(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(GatewayError::Transport("reset".into()).is_transient());
        assert!(GatewayError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(GatewayError::Status {
            status: 503,
            body: String::new()
        }
        .is_transient());
    }

    #[test]
    fn test_permanent_errors() {
        assert!(!GatewayError::Status {
            status: 401,
            body: String::new()
        }
        .is_transient());
        assert!(!GatewayError::Rejected {
            error_code: Some("WRONG_PASSWORD".into()),
            payload: None
        }
        .is_transient());
        assert!(!GatewayError::ClientUnavailable.is_transient());
    }

    #[test]
    fn test_error_code_rendering() {
        assert_eq!(ErrorCode::RpcError.to_string(), "RPC_ERROR");
        assert_eq!(
            ErrorCode::InitialRefreshFailed.to_string(),
            "INITIAL_REFRESH_FAILED"
        );
        assert_eq!(
            ErrorCode::BackgroundRefreshFailed.to_string(),
            "BACKGROUND_REFRESH_FAILED"
        );
        assert_eq!(ErrorCode::LogoutError.to_string(), "LOGOUT_ERROR");
        assert_eq!(
            ErrorCode::login(Some("USER_NOT_FOUND")).to_string(),
            "LOGIN_USER_NOT_FOUND"
        );
        assert_eq!(ErrorCode::login(None).to_string(), "LOGIN_UNKNOWN_FAILURE");
        assert_eq!(ErrorCode::login(Some("  ")).to_string(), "LOGIN_UNKNOWN_FAILURE");
    }

    #[test]
    fn test_error_code_serializes_as_string() {
        let json = serde_json::to_value(ErrorCode::login(Some("WRONG_PASSWORD"))).unwrap();
        assert_eq!(json, serde_json::json!("LOGIN_WRONG_PASSWORD"));
    }

    #[test]
    fn test_server_error_code() {
        let err = GatewayError::Rejected {
            error_code: Some("USER_NOT_CONFIRMED_EMAIL".into()),
            payload: None,
        };
        assert_eq!(err.server_error_code(), Some("USER_NOT_CONFIRMED_EMAIL"));
        assert_eq!(GatewayError::Canary("x".into()).server_error_code(), None);
    }
}
