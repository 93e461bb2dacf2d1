//! Sign in from a tab sitting on the login page and follow it home.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use auth_engine::{AuthState, Credentials};
use navigation_engine::NavState;
use serde::Serialize;
use std::io::{self, Write};
use tracing::info;

#[derive(Serialize)]
struct LoginOutcome {
    authenticated: bool,
    email: Option<String>,
    error_code: Option<String>,
    location: String,
}

pub async fn login(
    ctx: &Context,
    tab_id: &str,
    email: Option<String>,
    password: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let login_path = ctx.config.login_path.clone();
    let (tab, router) = ctx.open_tab(tab_id, &login_path)?;
    let settled = tab.auth().settled().await?;

    if settled.state == AuthState::Stable {
        let email = settled.user().and_then(|u| u.email.clone());
        output::print_success(
            &format!("Already signed in as {}", email.as_deref().unwrap_or("unknown")),
            format,
        );
        tab.shutdown().await?;
        return Ok(());
    }

    let email = match email {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    if email.is_empty() {
        anyhow::bail!("Email is required");
    }
    let password = match password {
        Some(password) => password,
        None => rpassword::prompt_password("Password: ")?,
    };
    if password.is_empty() {
        anyhow::bail!("Password is required");
    }

    tab.login(Credentials::new(email, password))?;
    let snapshot = tab
        .auth()
        .wait_for(|s| s.state == AuthState::Stable || s.login_error().is_some())
        .await?;

    if snapshot.state == AuthState::Stable {
        info!("signed in, waiting for redirect");
        tab.wait_for_navigation(|n| n.state == NavState::Idle && n.pathname != login_path)
            .await;
    }

    let outcome = LoginOutcome {
        authenticated: snapshot.state == AuthState::Stable,
        email: snapshot.user().and_then(|u| u.email.clone()),
        error_code: snapshot.error_code().map(|c| c.to_string()),
        location: router.location().href(),
    };
    tab.shutdown().await?;

    output::print(
        &outcome,
        |o| match (&o.email, &o.error_code) {
            (Some(email), _) if o.authenticated => {
                format!("Signed in as {}, now at {}", email, o.location)
            }
            (_, Some(code)) => format!("Login failed ({}), still at {}", code, o.location),
            _ => format!("Login finished without a session, at {}", o.location),
        },
        format,
    );
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
