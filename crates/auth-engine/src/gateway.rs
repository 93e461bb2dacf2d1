//! The RPC surface the auth machine drives, and the canary-confirmed
//! compound operations built on it.

use crate::error::GatewayError;
use crate::status::{AuthStatus, Credentials};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

/// A parsed status plus the raw body it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcReply {
    pub status: AuthStatus,
    pub raw: Value,
}

impl RpcReply {
    pub fn new(status: AuthStatus, raw: Value) -> Self {
        Self { status, raw }
    }
}

/// A refresh or login whose result was followed by a successful canary call.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedReply {
    pub reply: RpcReply,
    pub canary: Value,
}

/// Backend auth RPCs. Implementations carry the session cookie themselves.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// `auth_status`
    async fn check_status(&self) -> Result<RpcReply, GatewayError>;

    /// `refresh`; the reply must not be trusted until a canary call succeeds.
    async fn refresh(&self) -> Result<RpcReply, GatewayError>;

    /// `login`
    async fn login(&self, credentials: &Credentials) -> Result<RpcReply, GatewayError>;

    /// `logout`
    async fn logout(&self) -> Result<RpcReply, GatewayError>;

    /// `auth_test`; only completion matters.
    async fn canary(&self) -> Result<Value, GatewayError>;
}

/// Refresh, then await a canary call before reporting the new status.
///
/// Fail-closed: a canary failure fails the whole operation.
pub async fn refresh_and_canary(gateway: &dyn AuthGateway) -> Result<ConfirmedReply, GatewayError> {
    let reply = gateway.refresh().await?;
    let canary = confirm_with_canary(gateway, "refresh").await?;
    Ok(ConfirmedReply { reply, canary })
}

/// Log in, then await a canary call before reporting success.
///
/// A reply that is not authenticated is a rejection even on HTTP success.
pub async fn login_and_canary(
    gateway: &dyn AuthGateway,
    credentials: &Credentials,
) -> Result<ConfirmedReply, GatewayError> {
    let reply = gateway.login(credentials).await?;
    if !reply.status.is_authenticated {
        return Err(GatewayError::Rejected {
            error_code: reply.status.error_code.clone(),
            payload: None,
        });
    }
    let canary = confirm_with_canary(gateway, "login").await?;
    Ok(ConfirmedReply { reply, canary })
}

async fn confirm_with_canary(gateway: &dyn AuthGateway, after: &str) -> Result<Value, GatewayError> {
    match gateway.canary().await {
        Ok(value) => {
            debug!(after, "canary confirmed cookie propagation");
            Ok(value)
        }
        Err(e) => {
            warn!(after, error = %e, "canary request failed");
            Err(GatewayError::Canary(e.to_string()))
        }
    }
}
