//! Render, extract, upload and accumulate.

use std::collections::HashSet;
use std::sync::Arc;

use indicatif::ProgressBar;
use tracing::{debug, info, warn};

use super::accumulator::Accumulator;
use super::PipelineError;
use crate::checkpoint::{Checkpoint, CheckpointStore, KnownIdsStore};
use crate::extract::{ExtractContext, PageExtractor};
use crate::frontier::FrontierState;
use crate::models::{Harvested, ItemId, StoredRecord};
use crate::render::{RenderOptions, Renderer};
use crate::upload::UploadGateway;

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Ids handed to the processor, including ones skipped as already stored.
    pub attempted: usize,
    pub already_stored: usize,
    pub render_failures: usize,
    pub extraction_failures: usize,
    /// Records the store refused (per-object rejection).
    pub rejected: usize,
    pub stored: usize,
    pub media_failures: usize,
    /// Incremental checkpoint writes, not counting the final one.
    pub checkpoints: usize,
    pub checkpoint_failures: usize,
}

/// Processes ids for one run and owns its accumulator.
pub struct BatchProcessor<E: PageExtractor> {
    renderer: Arc<dyn Renderer>,
    extractor: E,
    gateway: UploadGateway,
    checkpoints: CheckpointStore,
    known_ids: Option<KnownIdsStore>,
    accumulator: Accumulator<E::Output>,
    /// Ids whose render failed this run; never persisted as known.
    render_failed: HashSet<ItemId>,
    render_options: RenderOptions,
    checkpoint_interval: usize,
    stats: BatchStats,
    progress: ProgressBar,
}

impl<E: PageExtractor> BatchProcessor<E> {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        extractor: E,
        gateway: UploadGateway,
        checkpoints: CheckpointStore,
        render_options: RenderOptions,
        checkpoint_interval: usize,
    ) -> Self {
        Self {
            renderer,
            extractor,
            gateway,
            checkpoints,
            known_ids: None,
            accumulator: Accumulator::new(),
            render_failed: HashSet::new(),
            render_options,
            checkpoint_interval,
            stats: BatchStats::default(),
            progress: ProgressBar::hidden(),
        }
    }

    /// Report per-id progress on `progress`.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Seed every resume from `store` and keep it updated on each checkpoint.
    pub fn with_known_ids(mut self, store: KnownIdsStore) -> Self {
        self.known_ids = Some(store);
        self
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    pub fn accumulator(&self) -> &Accumulator<E::Output> {
        &self.accumulator
    }

    pub fn stats(&self) -> &BatchStats {
        &self.stats
    }

    pub fn run_name(&self) -> &str {
        self.checkpoints.run()
    }

    /// Load the run checkpoint into the accumulator.
    ///
    /// Returns the saved frontier, merged with the shared known ids when a
    /// [`KnownIdsStore`] is attached. Empty on a cold start.
    pub async fn resume(&mut self) -> Result<FrontierState, PipelineError> {
        let mut known = match self.known_ids {
            Some(ref store) => store.load().await?,
            None => Vec::new(),
        };
        let shared = known.len();

        let loaded: Option<Checkpoint<E::Output>> = self.checkpoints.load().await?;
        let Some(checkpoint) = loaded else {
            if shared > 0 {
                info!("Starting run {} with {} known ids", self.run_name(), shared);
            }
            return Ok(FrontierState::from_ids(known));
        };

        self.accumulator = Accumulator::from_records(checkpoint.records);
        known.extend(checkpoint.known_ids);
        let frontier = FrontierState::from_ids(known);
        info!(
            "Resumed run {}: {} known ids, {} records{}",
            checkpoint.run,
            frontier.len(),
            self.accumulator.len(),
            if checkpoint.complete { " (previously complete)" } else { "" }
        );
        Ok(frontier)
    }

    /// Process `ids` in order.
    ///
    /// `frontier` is what gets persisted as known ids; ids of this batch that
    /// have not been attempted yet are left out of intermediate checkpoints.
    /// Returns the records newly added to the accumulator.
    pub async fn process(
        &mut self,
        ids: &[ItemId],
        frontier: &FrontierState,
    ) -> Result<Vec<StoredRecord<E::Output>>, PipelineError> {
        let mut added = Vec::new();
        self.progress.inc_length(ids.len() as u64);

        for (i, id) in ids.iter().enumerate() {
            self.stats.attempted += 1;
            self.progress.inc(1);

            if self.accumulator.contains(id) {
                self.stats.already_stored += 1;
                continue;
            }

            let Some(stored) = self.process_one(id).await? else {
                continue;
            };
            if !self.accumulator.push(stored.clone()) {
                continue;
            }
            self.stats.stored += 1;
            added.push(stored);

            if self.checkpoint_interval > 0 && self.accumulator.len() % self.checkpoint_interval == 0 {
                let known = self.persisted_ids(frontier, &ids[i + 1..]);
                if self.write_checkpoint(&known, false).await {
                    self.stats.checkpoints += 1;
                }
            }
        }

        Ok(added)
    }

    async fn process_one(
        &mut self,
        id: &str,
    ) -> Result<Option<StoredRecord<E::Output>>, PipelineError> {
        let url = self.extractor.detail_url(id);
        let html = match self.renderer.render(&url, &self.render_options).await {
            Ok(html) => {
                self.render_failed.remove(id);
                html
            }
            Err(e) => {
                warn!("Skipping {}: {}", id, e);
                self.stats.render_failures += 1;
                self.render_failed.insert(id.to_string());
                return Ok(None);
            }
        };

        let ctx = ExtractContext {
            item_id: id,
            source_url: &url,
        };
        let record = match self.extractor.extract_with_strategy(&html, &ctx) {
            Ok((record, strategy)) => {
                debug!("Extracted {} via {}", id, strategy.as_str());
                record
            }
            Err(failure) => {
                warn!("{}", failure);
                self.stats.extraction_failures += 1;
                return Ok(None);
            }
        };

        let json_path = match self.gateway.put_record(&record).await {
            Ok(path) => path,
            Err(e) if e.is_outage() => return Err(e.into()),
            Err(e) => {
                warn!("Record {} not stored: {}", record.item_id(), e);
                self.stats.rejected += 1;
                return Ok(None);
            }
        };

        let uploads = self.gateway.put_media_all(&record).await?;
        let total = uploads.len();
        let img_paths: Vec<String> = uploads.into_iter().flatten().collect();
        self.stats.media_failures += total - img_paths.len();

        Ok(Some(StoredRecord {
            record,
            json_path,
            img_paths,
        }))
    }

    /// Frontier ids that count as handled: everything except `outstanding`
    /// and ids whose render failed, so a later run picks those up again.
    fn persisted_ids(&self, frontier: &FrontierState, outstanding: &[ItemId]) -> Vec<ItemId> {
        if self.render_failed.is_empty() {
            return frontier.snapshot_excluding(outstanding);
        }
        let mut skip = outstanding.to_vec();
        skip.extend(self.render_failed.iter().cloned());
        frontier.snapshot_excluding(&skip)
    }

    /// Write a checkpoint, logging instead of failing. Returns whether the
    /// run checkpoint landed.
    async fn write_checkpoint(&mut self, known: &[ItemId], complete: bool) -> bool {
        if let Some(ref store) = self.known_ids {
            if let Err(e) = store.save(known).await {
                warn!("Known ids write to {} failed: {}", store.remote_path(), e);
                self.stats.checkpoint_failures += 1;
            }
        }

        match self
            .checkpoints
            .save(known, self.accumulator.records(), complete)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!("Checkpoint write for {} failed: {}", self.checkpoints.run(), e);
                self.stats.checkpoint_failures += 1;
                false
            }
        }
    }

    /// Write the completion checkpoint for the run.
    pub async fn finish(&mut self, frontier: &FrontierState) -> BatchStats {
        let known = self.persisted_ids(frontier, &[]);
        if self.write_checkpoint(&known, true).await {
            info!(
                "Run {} complete: {} records, {} known ids",
                self.checkpoints.run(),
                self.accumulator.len(),
                known.len()
            );
        }
        self.progress.finish_and_clear();
        self.stats.clone()
    }
}
