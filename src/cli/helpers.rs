//! Shared wiring for CLI commands.

use std::sync::Arc;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};

use crate::checkpoint::{CheckpointStore, KnownIdsStore};
use crate::config::Settings;
use crate::extract::PageExtractor;
use crate::pipeline::{BatchProcessor, BatchStats};
use crate::render::{create_renderer, Renderer};
use crate::storage::{create_store, MemoryStore, ObjectStore};
use crate::upload::{HttpMediaSource, UploadGateway};

/// Capabilities shared by every pipeline command.
pub struct Harness {
    pub renderer: Arc<dyn Renderer>,
    pub store: Arc<dyn ObjectStore>,
    pub gateway: UploadGateway,
}

impl Harness {
    pub async fn build(settings: &Settings, dry_run: bool) -> anyhow::Result<Self> {
        settings
            .ensure_directories()
            .context("Failed to create data directories")?;

        let store: Arc<dyn ObjectStore> = if dry_run {
            Arc::new(MemoryStore::new())
        } else {
            create_store(&settings.storage, &settings.objects_dir)
                .context("Failed to set up object storage")?
        };
        tracing::info!("Writing objects to {}", store.describe());

        let media = HttpMediaSource::new(
            settings.pipeline.media_timeout(),
            settings.browser.user_agent.as_deref(),
        )?;
        let gateway = UploadGateway::new(
            store.clone(),
            Arc::new(media),
            settings.pipeline.media_concurrency,
        );

        let renderer = create_renderer(&settings.browser)
            .await
            .context("Failed to start renderer")?;

        Ok(Self {
            renderer,
            store,
            gateway,
        })
    }

    /// Batch processor for one run, checkpointing locally and to the store.
    pub fn processor<E: PageExtractor>(
        &self,
        settings: &Settings,
        extractor: E,
        run: &str,
        checkpoint_interval: usize,
    ) -> anyhow::Result<BatchProcessor<E>> {
        let checkpoints = CheckpointStore::new(&settings.checkpoint_dir, run)
            .with_remote(self.store.clone(), settings.pipeline.remote_prefix.clone());
        Ok(BatchProcessor::new(
            self.renderer.clone(),
            extractor,
            self.gateway.clone(),
            checkpoints,
            settings.browser.page_options(),
            checkpoint_interval,
        )
        .with_progress(item_progress()?))
    }

    /// Id set shared by every discovery run, whatever the run name.
    pub fn known_ids(&self, settings: &Settings) -> KnownIdsStore {
        KnownIdsStore::new(&settings.checkpoint_dir, settings.pipeline.known_ids.clone())
            .with_remote(self.store.clone(), settings.pipeline.remote_prefix.clone())
    }

    pub async fn shutdown(&self) {
        self.renderer.shutdown().await;
    }
}

/// Progress bar for per-item processing; its length grows as batches arrive.
pub fn item_progress() -> anyhow::Result<ProgressBar> {
    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")?
            .progress_chars("█▓░"),
    );
    Ok(progress)
}

/// Print the counters of a finished run.
pub fn print_stats(run: &str, records: usize, stats: &BatchStats) {
    use console::style;

    println!(
        "{} Run {}: {} records stored ({} new)",
        style("✓").green(),
        style(run).bold(),
        records,
        stats.stored
    );
    println!(
        "  attempted {}, already stored {}, render failures {}, extraction failures {}",
        stats.attempted, stats.already_stored, stats.render_failures, stats.extraction_failures
    );
    if stats.rejected > 0 || stats.media_failures > 0 {
        println!(
            "  {} {} rejected records, {} failed media uploads",
            style("!").yellow(),
            stats.rejected,
            stats.media_failures
        );
    }
    if stats.checkpoint_failures > 0 {
        println!(
            "  {} {} checkpoint writes failed",
            style("!").yellow(),
            stats.checkpoint_failures
        );
    }
}
