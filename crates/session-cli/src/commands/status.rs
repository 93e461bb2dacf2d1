//! One-shot `auth_status` call.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use auth_engine::AuthGateway;

pub async fn status(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let gateway = ctx.gateway()?;
    let reply = match tokio::time::timeout(ctx.config.rpc_timeout(), gateway.check_status()).await {
        Ok(reply) => reply?,
        Err(_) => anyhow::bail!("auth_status timed out after {:?}", ctx.config.rpc_timeout()),
    };

    match format {
        OutputFormat::Json => output::print_line(&reply.raw),
        OutputFormat::Text => {
            let status = &reply.status;
            output::print_row("Backend", gateway.base_url().as_str());
            if status.is_authenticated {
                let email = status
                    .user
                    .as_ref()
                    .and_then(|u| u.email.as_deref())
                    .unwrap_or("unknown");
                output::print_row("Auth", "signed in");
                output::print_row("User", email);
                if let Some(expires_at) = status.token_expires_at {
                    output::print_row("Expires", &expires_at.to_rfc3339());
                }
            } else if status.expired_access_token_call_refresh {
                output::print_row("Auth", "access token expired, refresh required");
            } else {
                output::print_row("Auth", "signed out");
            }
        }
    }
    Ok(())
}
