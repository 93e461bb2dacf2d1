//! Status payloads exchanged with the auth RPCs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire shape shared by `auth_status`, `refresh`, `login` and `logout`.
///
/// Every field is optional on the wire; a bare `{}` reads as "not authenticated".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusPayload {
    pub is_authenticated: bool,
    pub uid: Option<i64>,
    pub sub: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub statbus_role: Option<String>,
    pub last_sign_in_at: Option<String>,
    pub created_at: Option<String>,
    pub expired_access_token_call_refresh: bool,
    pub token_expires_at: Option<String>,
    pub error_code: Option<String>,
}

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub uid: Option<i64>,
    pub sub: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub statbus_role: Option<String>,
    pub last_sign_in_at: Option<String>,
    pub created_at: Option<String>,
}

/// Normalized status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthStatus {
    pub is_authenticated: bool,
    pub user: Option<Identity>,
    pub expired_access_token_call_refresh: bool,
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Server-side code, never copied into the session's error code as-is.
    pub error_code: Option<String>,
}

impl From<StatusPayload> for AuthStatus {
    fn from(p: StatusPayload) -> Self {
        let token_expires_at = p
            .token_expires_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|t| t.with_timezone(&Utc));

        let user = (p.is_authenticated && (p.uid.is_some() || p.sub.is_some())).then(|| Identity {
            uid: p.uid,
            sub: p.sub,
            email: p.email,
            role: p.role,
            statbus_role: p.statbus_role,
            last_sign_in_at: p.last_sign_in_at,
            created_at: p.created_at,
        });

        Self {
            is_authenticated: p.is_authenticated,
            user,
            expired_access_token_call_refresh: p.expired_access_token_call_refresh,
            token_expires_at,
            error_code: p.error_code,
        }
    }
}

impl AuthStatus {
    /// Parse a raw RPC body.
    pub fn from_value(raw: &serde_json::Value) -> Result<Self, serde_json::Error> {
        StatusPayload::deserialize(raw).map(Self::from)
    }
}

/// Login form input.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}
