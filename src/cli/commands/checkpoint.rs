//! Checkpoint inspection.

use std::sync::Arc;

use anyhow::Context;
use console::style;

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::Settings;
use crate::storage::{create_store, MemoryStore, ObjectStore};

/// Print frontier and accumulator sizes of a run checkpoint.
pub async fn cmd_checkpoint_show(settings: &Settings, run: &str, dry_run: bool) -> anyhow::Result<()> {
    let store: Arc<dyn ObjectStore> = if dry_run {
        Arc::new(MemoryStore::new())
    } else {
        create_store(&settings.storage, &settings.objects_dir)?
    };
    let checkpoints = CheckpointStore::new(&settings.checkpoint_dir, run)
        .with_remote(store, settings.pipeline.remote_prefix.clone());

    let loaded: Option<Checkpoint<serde_json::Value>> = checkpoints
        .load()
        .await
        .with_context(|| format!("Failed to load checkpoint {}", run))?;

    let Some(checkpoint) = loaded else {
        println!("{} No checkpoint for run {}", style("!").yellow(), run);
        return Ok(());
    };

    let images: usize = checkpoint.records.iter().map(|r| r.img_paths.len()).sum();
    println!("\n{}", style(format!("Checkpoint: {}", checkpoint.run)).bold());
    println!("{}", "-".repeat(40));
    println!("{:<12} {}", "Saved:", checkpoint.saved_at.to_rfc3339());
    println!(
        "{:<12} {}",
        "Status:",
        if checkpoint.complete {
            style("Complete").green().to_string()
        } else {
            style("In progress").yellow().to_string()
        }
    );
    println!("{:<12} {}", "Known ids:", checkpoint.known_ids.len());
    println!("{:<12} {}", "Records:", checkpoint.records.len());
    println!("{:<12} {}", "Images:", images);
    println!("{:<12} {}", "Local:", checkpoints.local_path().display());
    Ok(())
}
