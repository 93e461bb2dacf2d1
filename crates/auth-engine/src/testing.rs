//! Scripted in-memory gateway for tests.
//!
//! Each operation answers from a queue of scripted results and falls back to
//! a fixed default once the queue is empty. Calls are counted and can be
//! delayed so tests can overlap them.

use crate::error::GatewayError;
use crate::gateway::{AuthGateway, RpcReply};
use crate::status::{AuthStatus, Credentials};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Status,
    Refresh,
    Login,
    Logout,
    Canary,
}

struct Script<T> {
    queue: Mutex<VecDeque<Result<T, GatewayError>>>,
    fallback: Mutex<Result<T, GatewayError>>,
    calls: AtomicUsize,
    delay: Mutex<Duration>,
}

impl<T: Clone> Script<T> {
    fn new(fallback: Result<T, GatewayError>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            calls: AtomicUsize::new(0),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    async fn answer(&self) -> Result<T, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.queue.lock().pop_front();
        scripted.unwrap_or_else(|| self.fallback.lock().clone())
    }
}

pub struct ScriptedGateway {
    status: Script<RpcReply>,
    refresh: Script<RpcReply>,
    login: Script<RpcReply>,
    logout: Script<RpcReply>,
    canary: Script<Value>,
    last_credentials: Mutex<Option<Credentials>>,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedGateway {
    /// Signed-out backend where refresh and login succeed.
    pub fn new() -> Self {
        Self {
            status: Script::new(Ok(unauthenticated())),
            refresh: Script::new(Ok(authenticated("ada@example.test"))),
            login: Script::new(Ok(authenticated("ada@example.test"))),
            logout: Script::new(Ok(unauthenticated())),
            canary: Script::new(Ok(json!({ "ok": true }))),
            last_credentials: Mutex::new(None),
        }
    }

    pub fn push_status(&self, result: Result<RpcReply, GatewayError>) -> &Self {
        self.status.queue.lock().push_back(result);
        self
    }

    pub fn push_refresh(&self, result: Result<RpcReply, GatewayError>) -> &Self {
        self.refresh.queue.lock().push_back(result);
        self
    }

    pub fn push_login(&self, result: Result<RpcReply, GatewayError>) -> &Self {
        self.login.queue.lock().push_back(result);
        self
    }

    pub fn push_logout(&self, result: Result<RpcReply, GatewayError>) -> &Self {
        self.logout.queue.lock().push_back(result);
        self
    }

    pub fn push_canary(&self, result: Result<Value, GatewayError>) -> &Self {
        self.canary.queue.lock().push_back(result);
        self
    }

    /// Answer for `auth_status` once the queue is drained.
    pub fn set_status(&self, result: Result<RpcReply, GatewayError>) -> &Self {
        *self.status.fallback.lock() = result;
        self
    }

    pub fn set_delay(&self, op: Op, delay: Duration) -> &Self {
        match op {
            Op::Status => *self.status.delay.lock() = delay,
            Op::Refresh => *self.refresh.delay.lock() = delay,
            Op::Login => *self.login.delay.lock() = delay,
            Op::Logout => *self.logout.delay.lock() = delay,
            Op::Canary => *self.canary.delay.lock() = delay,
        }
        self
    }

    pub fn calls(&self, op: Op) -> usize {
        let counter = match op {
            Op::Status => &self.status.calls,
            Op::Refresh => &self.refresh.calls,
            Op::Login => &self.login.calls,
            Op::Logout => &self.logout.calls,
            Op::Canary => &self.canary.calls,
        };
        counter.load(Ordering::SeqCst)
    }

    pub fn last_credentials(&self) -> Option<Credentials> {
        self.last_credentials.lock().clone()
    }
}

#[async_trait]
impl AuthGateway for ScriptedGateway {
    async fn check_status(&self) -> Result<RpcReply, GatewayError> {
        self.status.answer().await
    }

    async fn refresh(&self) -> Result<RpcReply, GatewayError> {
        self.refresh.answer().await
    }

    async fn login(&self, credentials: &Credentials) -> Result<RpcReply, GatewayError> {
        *self.last_credentials.lock() = Some(credentials.clone());
        self.login.answer().await
    }

    async fn logout(&self) -> Result<RpcReply, GatewayError> {
        self.logout.answer().await
    }

    async fn canary(&self) -> Result<Value, GatewayError> {
        self.canary.answer().await
    }
}

fn reply(raw: Value) -> RpcReply {
    let status = AuthStatus::from_value(&raw).unwrap_or_default();
    RpcReply::new(status, raw)
}

/// Signed-in status for `email`.
pub fn authenticated(email: &str) -> RpcReply {
    reply(json!({
        "is_authenticated": true,
        "uid": 1,
        "sub": "00000000-0000-4000-8000-000000000001",
        "email": email,
        "role": "authenticated",
        "statbus_role": "regular_user",
    }))
}

/// Signed-in status whose access token expires at `expires_at` (RFC 3339).
pub fn authenticated_until(email: &str, expires_at: &str) -> RpcReply {
    let mut r = authenticated(email);
    r.raw["token_expires_at"] = json!(expires_at);
    reply(r.raw)
}

/// Signed-out status.
pub fn unauthenticated() -> RpcReply {
    reply(json!({ "is_authenticated": false }))
}

/// Access token expired; the server asks the client to refresh.
pub fn refresh_needed() -> RpcReply {
    reply(json!({
        "is_authenticated": false,
        "expired_access_token_call_refresh": true,
    }))
}

/// Login refused with a server error code.
pub fn rejected(error_code: &str) -> GatewayError {
    GatewayError::Rejected {
        error_code: Some(error_code.to_string()),
        payload: None,
    }
}

pub fn transport_error() -> GatewayError {
    GatewayError::Transport("connection reset".to_string())
}
