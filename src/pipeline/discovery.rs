//! Listing discovery: scroll, grow the frontier, process batches.

use std::sync::Arc;

use tracing::{info, warn};

use super::batch::BatchProcessor;
use super::PipelineError;
use crate::extract::PageExtractor;
use crate::frontier::{FrontierConfig, FrontierState, FrontierTracker, ListingIds};
use crate::models::ItemId;
use crate::render::{ListingSession, RenderOptions, Renderer, ScrollPlan};

/// Summary of one listing session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryOutcome {
    /// Ids first seen on this listing.
    pub discovered: usize,
    /// Size of the frontier afterwards.
    pub total_known: usize,
    /// Records added to the accumulator during this session.
    pub newly_yielded: usize,
    pub rounds: usize,
    /// Whether the listing stopped growing (as opposed to hitting the round cap).
    pub exhausted: bool,
}

/// Drives listing sessions against one renderer.
pub struct Discovery {
    renderer: Arc<dyn Renderer>,
    listing: ListingIds,
    config: FrontierConfig,
    options: RenderOptions,
}

impl Discovery {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        listing: ListingIds,
        config: FrontierConfig,
        options: RenderOptions,
    ) -> Self {
        Self {
            renderer,
            listing,
            config,
            options,
        }
    }

    /// Scroll `url` until it stops growing, feeding batches to `processor`.
    ///
    /// `seed` holds ids already handled; they never form a batch again. The
    /// grown frontier is returned alongside the outcome. No completion
    /// checkpoint is written here.
    pub async fn run<E: PageExtractor>(
        &self,
        url: &str,
        seed: FrontierState,
        processor: &mut BatchProcessor<E>,
    ) -> Result<(DiscoveryOutcome, FrontierState), PipelineError> {
        let seed_len = seed.len();
        let yielded_before = processor.accumulator().len();
        let mut tracker = FrontierTracker::new(&self.config).seeded(seed);

        info!("Opening listing {}", url);
        let mut session = self.renderer.open_listing(url, &self.options).await?;
        let scrolled = self.scroll(session.as_mut(), &mut tracker, processor).await;
        session.close().await;
        let exhausted = scrolled?;

        let rest = tracker.drain_pending();
        if !rest.is_empty() {
            info!("Processing final {} ids", rest.len());
            processor.process(&rest, tracker.state()).await?;
        }

        let outcome = DiscoveryOutcome {
            discovered: tracker.state().len() - seed_len,
            total_known: tracker.state().len(),
            newly_yielded: processor.accumulator().len() - yielded_before,
            rounds: tracker.rounds(),
            exhausted,
        };
        info!(
            "Listing {} done after {} rounds: {} new ids, {} new records",
            url, outcome.rounds, outcome.discovered, outcome.newly_yielded
        );
        Ok((outcome, tracker.into_state()))
    }

    async fn scroll<E: PageExtractor>(
        &self,
        session: &mut dyn ListingSession,
        tracker: &mut FrontierTracker,
        processor: &mut BatchProcessor<E>,
    ) -> Result<bool, PipelineError> {
        let plan = self.config.scroll_plan();
        while tracker.rounds() < self.config.max_rounds {
            let ids = self.round_ids(session, &plan).await;
            let outcome = tracker.advance_round(ids);

            if let Some(batch) = outcome.batch {
                info!(
                    "Batch of {} ids (frontier {})",
                    batch.len(),
                    tracker.state().len()
                );
                processor.process(&batch, tracker.state()).await?;
            }

            if outcome.terminated {
                return Ok(true);
            }
        }
        warn!(
            "Stopped after {} rounds without the listing settling",
            self.config.max_rounds
        );
        Ok(false)
    }

    /// Ids visible after one scroll; a failed round counts as empty.
    async fn round_ids(&self, session: &mut dyn ListingSession, plan: &ScrollPlan) -> Vec<ItemId> {
        if let Err(e) = session.advance(plan).await {
            warn!("Scroll failed: {}", e);
        }
        match session.snapshot().await {
            Ok(html) => self.listing.extract(&html),
            Err(e) => {
                warn!("Listing snapshot failed: {}", e);
                Vec::new()
            }
        }
    }
}
