//! Run a tab at a path and stream its journal until interrupted.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use session_journal::JournalEntry;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

pub async fn watch(ctx: &Context, tab_id: &str, path: &str, format: &OutputFormat) -> Result<()> {
    let (tab, _router) = ctx.open_tab(tab_id, path)?;
    let mut entries = tab.journal().subscribe();

    // The backlog may overlap with what the subscription delivers first.
    let mut backlog = tab.journal().entries();
    for entry in &backlog {
        print_entry(entry, format);
    }

    loop {
        tokio::select! {
            entry = entries.recv() => match entry {
                Ok(entry) => {
                    if let Some(idx) = backlog.iter().position(|seen| *seen == entry) {
                        backlog.remove(idx);
                    } else {
                        print_entry(&entry, format);
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "journal output fell behind"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let status = tab.navigation();
    tab.shutdown().await?;
    if matches!(format, OutputFormat::Text) {
        output::print_row("Stopped at", &status.pathname);
    }
    Ok(())
}

fn print_entry(entry: &JournalEntry, format: &OutputFormat) {
    match format {
        OutputFormat::Json => output::print_line(entry),
        OutputFormat::Text => match entry {
            JournalEntry::Transition(r) => println!(
                "{} {:<10} {} -> {}  [{}]",
                r.at.format("%H:%M:%S%.3f"),
                r.machine.as_str(),
                r.from,
                r.to,
                r.event
            ),
            JournalEntry::Navigation(s) => println!(
                "{} {:<10} {} => {}  ({})",
                s.at.format("%H:%M:%S%.3f"),
                "navigate",
                s.from_path,
                s.target_path,
                s.state
            ),
        },
    }
}
