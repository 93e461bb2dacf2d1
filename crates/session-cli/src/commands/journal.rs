//! Navigation snapshots a tab persisted before its redirects.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use session_journal::Journal;
use session_storage::JsonFileStore;
use std::sync::Arc;

pub async fn journal(ctx: &Context, tab_id: &str, format: &OutputFormat) -> Result<()> {
    let file = ctx.paths.tab_storage_file(tab_id);
    if !file.exists() {
        output::print_error(&format!("No stored state for tab '{}'", tab_id), format);
        return Ok(());
    }

    let journal = Journal::new(ctx.config.journal_capacity)
        .with_store(Arc::new(JsonFileStore::open(file)?));
    let snapshots = journal.persisted_navigations();

    match format {
        OutputFormat::Json => output::print_line(&snapshots),
        OutputFormat::Text if snapshots.is_empty() => println!("No navigations recorded."),
        OutputFormat::Text => {
            for s in &snapshots {
                println!(
                    "{}  {} => {}",
                    s.at.to_rfc3339(),
                    s.from_path,
                    s.target_path
                );
                output::print_row("  state", &s.state);
                output::print_row(
                    "  auth",
                    if s.is_auth_loading {
                        "loading"
                    } else if s.is_authenticated {
                        "signed in"
                    } else {
                        "signed out"
                    },
                );
                if let Some(path) = &s.last_known_path {
                    output::print_row("  saved", path);
                }
                if let Some(path) = &s.setup_path {
                    output::print_row("  setup", path);
                }
            }
        }
    }
    Ok(())
}
