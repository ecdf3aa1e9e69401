//! Work claiming over the shared backlog.
//!
//! Claims pick a random pending row so concurrent workers rarely collide.
//! The default claim is a blind status write: two workers can win the same
//! row and both process it, which is tolerated because every storage write
//! is an idempotent overwrite. `strict` switches to a conditional update
//! and retries on a lost race.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backlog::{Backlog, Result, WorkCounters};
use crate::extract::PageExtractor;
use crate::models::{WorkItem, WorkStatus};
use crate::pipeline::{BatchProcessor, BatchStats, Discovery, PipelineError};
use crate::render::random_index;

/// Identity recorded on claimed rows: `<hostname>:<pid>`.
pub fn worker_id() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    format!("{}:{}", host, std::process::id())
}

/// Claims and completes backlog rows for one worker.
pub struct WorkClaimer {
    backlog: Arc<dyn Backlog>,
    worker: String,
    strict: bool,
}

impl WorkClaimer {
    pub fn new(backlog: Arc<dyn Backlog>, worker: impl Into<String>, strict: bool) -> Self {
        Self {
            backlog,
            worker: worker.into(),
            strict,
        }
    }

    pub fn worker(&self) -> &str {
        &self.worker
    }

    /// Claim a random pending row, or `None` when the backlog is drained.
    pub fn claim(&self) -> Result<Option<WorkItem>> {
        loop {
            let pending = self.backlog.select_pending()?;
            if pending.is_empty() {
                return Ok(None);
            }
            let mut item = pending[random_index(pending.len())].clone();

            if self.strict {
                if !self.backlog.claim_if_pending(&item.url, &self.worker)? {
                    debug!("Lost claim race for {}", item.url);
                    continue;
                }
            } else {
                self.backlog
                    .update_status(&item.url, WorkStatus::InProgress, Some(&self.worker), None)?;
            }

            item.status = WorkStatus::InProgress;
            item.worker = Some(self.worker.clone());
            return Ok(Some(item));
        }
    }

    /// Mark a claimed row done with its counters.
    pub fn complete(&self, url: &str, counters: WorkCounters) -> Result<()> {
        self.backlog
            .update_status(url, WorkStatus::Done, Some(&self.worker), Some(counters))
    }
}

/// Totals for one `work` session.
#[derive(Debug, Clone, Default)]
pub struct WorkSummary {
    pub completed: usize,
    /// Rows left in `doing` because their listing could not be opened.
    pub abandoned: usize,
    pub batch: BatchStats,
}

/// Claim rows until none are pending, running discovery for each.
///
/// All listings share one run: the frontier carries over between rows so an
/// item already handled on an earlier listing is not processed again. The
/// completion checkpoint is written once the backlog is drained.
pub async fn drain_backlog<E: PageExtractor>(
    claimer: &WorkClaimer,
    discovery: &Discovery,
    processor: &mut BatchProcessor<E>,
) -> std::result::Result<WorkSummary, PipelineError> {
    let mut frontier = processor.resume().await?;
    let mut summary = WorkSummary::default();

    while let Some(item) = claimer.claim()? {
        info!("Claimed {} as {}", item.url, claimer.worker());
        match discovery.run(&item.url, frontier.clone(), processor).await {
            Ok((outcome, grown)) => {
                frontier = grown;
                claimer.complete(
                    &item.url,
                    WorkCounters {
                        total_num: outcome.discovered as i64,
                        get_num: outcome.newly_yielded as i64,
                    },
                )?;
                summary.completed += 1;
            }
            Err(PipelineError::Render(e)) => {
                warn!("Abandoning {}: {}", item.url, e);
                summary.abandoned += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!("Backlog drained after {} rows", summary.completed);
    summary.batch = processor.finish(&frontier).await;
    Ok(summary)
}
