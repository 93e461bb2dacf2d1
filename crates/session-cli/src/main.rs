//! sessionctl - run a tab session against a live auth backend.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use session_config::{init_logging_for_service, Paths};
use std::path::PathBuf;
use tracing::debug;

/// Drive the auth and navigation machines of one tab from the terminal.
#[derive(Parser)]
#[command(name = "sessionctl")]
#[command(about = "Inspect and exercise tab sessions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the configured one
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory holding config.json, storage and logs
    #[arg(long, env = "SESSIONCTL_HOME", global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the backend for the current auth status
    Status,

    /// Sign in from the login page and follow the redirect
    Login {
        #[arg(short, long)]
        email: Option<String>,

        /// Prompted for when absent
        #[arg(long, env = "SESSION_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        #[arg(long, default_value = "cli")]
        tab: String,
    },

    /// Open a tab at a path and stream its journal until Ctrl-C
    Watch {
        #[arg(short, long, default_value = "/")]
        path: String,

        #[arg(long, default_value = "cli")]
        tab: String,
    },

    /// Show navigation snapshots a tab persisted
    Journal {
        #[arg(long, default_value = "cli")]
        tab: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let paths = match cli.base_dir.clone() {
        Some(dir) => Ok(Paths::with_base_dir(dir)),
        None => Paths::new(),
    };
    let ctx = match paths.map_err(anyhow::Error::from).and_then(commands::Context::load) {
        Ok(ctx) => ctx,
        Err(e) => {
            output::print_error(&e.to_string(), &cli.format);
            std::process::exit(1);
        }
    };

    let level = cli.log_level.as_deref().unwrap_or(&ctx.config.log_level);
    init_logging_for_service("sessionctl", level, Some(&ctx.paths));
    debug!(base_dir = %ctx.paths.base_dir().display(), "configuration loaded");

    let result = match cli.command {
        Commands::Status => commands::status(&ctx, &cli.format).await,
        Commands::Login {
            email,
            password,
            tab,
        } => commands::login(&ctx, &tab, email, password, &cli.format).await,
        Commands::Watch { path, tab } => commands::watch(&ctx, &tab, &path, &cli.format).await,
        Commands::Journal { tab } => commands::journal(&ctx, &tab, &cli.format).await,
    };

    if let Err(e) = result {
        output::print_error(&e.to_string(), &cli.format);
        std::process::exit(1);
    }
}
