//! Backlog management commands.

use anyhow::Context;
use console::style;

use crate::backlog::{Backlog, SqliteBacklog};
use crate::config::Settings;

fn open(settings: &Settings) -> anyhow::Result<SqliteBacklog> {
    SqliteBacklog::new(&settings.backlog_path)
        .with_context(|| format!("Failed to open backlog {}", settings.backlog_path.display()))
}

/// Add listing URLs as pending rows.
pub fn cmd_backlog_add(settings: &Settings, urls: &[String]) -> anyhow::Result<()> {
    let backlog = open(settings)?;
    let added = backlog.add(urls)?;
    println!(
        "{} Added {} of {} URLs",
        style("✓").green(),
        added,
        urls.len()
    );
    if added < urls.len() {
        println!(
            "  {} {} already present",
            style("!").yellow(),
            urls.len() - added
        );
    }
    Ok(())
}

/// Print row counts per status.
pub fn cmd_backlog_status(settings: &Settings) -> anyhow::Result<()> {
    let backlog = open(settings)?;
    let counts = backlog.counts()?;

    println!("\n{}", style("Backlog").bold());
    println!("{}", "-".repeat(40));
    println!("{:<12} {}", "Database:", backlog.path().display());
    println!("{:<12} {}", "Pending:", counts.pending);
    println!("{:<12} {}", "Doing:", style(counts.in_progress).yellow());
    println!("{:<12} {}", "Done:", style(counts.done).green());
    Ok(())
}

/// Return in-progress rows to pending.
pub fn cmd_backlog_reset_stale(settings: &Settings) -> anyhow::Result<()> {
    let backlog = open(settings)?;
    let reset = backlog.reset_stale()?;
    println!("{} Reset {} in-progress rows", style("✓").green(), reset);
    Ok(())
}
