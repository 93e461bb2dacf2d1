//! HTTP implementation of [`AuthGateway`] against the PostgREST RPC surface.
//!
//! Session credentials travel as cookies, so the underlying client keeps a
//! cookie store shared by every call made through one gateway.

use crate::error::GatewayError;
use crate::gateway::{AuthGateway, RpcReply};
use crate::status::{AuthStatus, Credentials, StatusPayload};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use url::Url;

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

#[derive(Clone)]
pub struct HttpAuthGateway {
    http_client: reqwest::Client,
    base_url: Url,
}

impl HttpAuthGateway {
    /// Create a gateway with its own cookie jar.
    pub fn new(base_url: Url) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self::with_client(http_client, base_url))
    }

    pub fn with_client(http_client: reqwest::Client, base_url: Url) -> Self {
        Self {
            http_client,
            base_url,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/rest/rpc/{name}`
    fn rpc_url(&self, name: &str) -> Result<Url, GatewayError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/rest/rpc/{name}"))
            .map_err(|e| GatewayError::Transport(format!("invalid rpc url: {e}")))
    }

    async fn call(&self, name: &str, body: Value) -> Result<(reqwest::StatusCode, String), GatewayError> {
        let url = self.rpc_url(name)?;
        tracing::debug!(rpc = name, "calling auth rpc");

        let response = self
            .http_client
            .post(url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        Ok((status, text))
    }

    async fn call_status(&self, name: &str, body: Value) -> Result<RpcReply, GatewayError> {
        let (status, text) = self.call(name, body).await?;
        if !status.is_success() {
            tracing::warn!(
                rpc = name,
                status = %status,
                body_summary = %summarize_response_body(&text),
                "auth rpc failed"
            );
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        parse_reply(&text)
    }
}

fn parse_reply(text: &str) -> Result<RpcReply, GatewayError> {
    let raw: Value = if text.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(text).map_err(|e| GatewayError::Decode(e.to_string()))?
    };
    let status = AuthStatus::from_value(&raw).map_err(|e| GatewayError::Decode(e.to_string()))?;
    Ok(RpcReply::new(status, raw))
}

#[async_trait]
impl AuthGateway for HttpAuthGateway {
    async fn check_status(&self) -> Result<RpcReply, GatewayError> {
        self.call_status("auth_status", Value::Object(Default::default()))
            .await
    }

    async fn refresh(&self) -> Result<RpcReply, GatewayError> {
        let (status, text) = self.call("refresh", Value::Object(Default::default())).await?;
        if status.is_success() {
            return parse_reply(&text);
        }
        tracing::warn!(
            status = %status,
            body_summary = %summarize_response_body(&text),
            "refresh rejected"
        );
        // A refused refresh still describes the session; keep it for the machine.
        match serde_json::from_str::<StatusPayload>(&text) {
            Ok(payload) => Err(GatewayError::Rejected {
                error_code: payload.error_code.clone(),
                payload: Some(payload),
            }),
            Err(_) => Err(GatewayError::Status {
                status: status.as_u16(),
                body: text,
            }),
        }
    }

    async fn login(&self, credentials: &Credentials) -> Result<RpcReply, GatewayError> {
        let body = serde_json::to_value(credentials).map_err(|e| GatewayError::Decode(e.to_string()))?;
        let (status, text) = self.call("login", body).await?;

        if !status.is_success() {
            tracing::warn!(
                status = %status,
                body_summary = %summarize_response_body(&text),
                "login rejected"
            );
            let payload = serde_json::from_str::<StatusPayload>(&text).ok();
            return Err(GatewayError::Rejected {
                error_code: payload.as_ref().and_then(|p| p.error_code.clone()),
                payload,
            });
        }

        let reply = parse_reply(&text)?;
        if !reply.status.is_authenticated {
            tracing::info!(error_code = ?reply.status.error_code, "login refused");
            return Err(GatewayError::Rejected {
                error_code: reply.status.error_code.clone(),
                payload: serde_json::from_value(reply.raw).ok(),
            });
        }
        Ok(reply)
    }

    async fn logout(&self) -> Result<RpcReply, GatewayError> {
        self.call_status("logout", Value::Object(Default::default())).await
    }

    async fn canary(&self) -> Result<Value, GatewayError> {
        let (status, text) = self.call("auth_test", Value::Object(Default::default())).await?;
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::Null))
    }
}
