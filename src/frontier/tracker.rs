//! Round-by-round frontier growth, stagnation and batch triggering.

use tracing::debug;

use super::config::FrontierConfig;
use super::state::FrontierState;
use crate::models::ItemId;

/// Result of one discovery round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundOutcome {
    /// Ids first seen in this round.
    pub new_ids: Vec<ItemId>,
    /// Ids to process now, when the batch threshold was crossed.
    pub batch: Option<Vec<ItemId>>,
    /// Set only on the round that reaches the stagnation limit.
    pub terminated: bool,
}

/// Grows a [`FrontierState`] from listing snapshots.
#[derive(Debug, Clone)]
pub struct FrontierTracker {
    state: FrontierState,
    stagnation_limit: usize,
    batch_threshold: usize,
    stagnant_rounds: usize,
    /// Position in `state` up to which ids were handed out as batches.
    batch_cursor: usize,
    rounds: usize,
}

impl FrontierTracker {
    pub fn new(config: &FrontierConfig) -> Self {
        Self::with_limits(config.stagnation_rounds, config.batch_threshold)
    }

    pub fn with_limits(stagnation_limit: usize, batch_threshold: usize) -> Self {
        Self {
            state: FrontierState::new(),
            stagnation_limit: stagnation_limit.max(1),
            batch_threshold,
            stagnant_rounds: 0,
            batch_cursor: 0,
            rounds: 0,
        }
    }

    /// Resume from a saved state. Saved ids are treated as already handled.
    pub fn seeded(mut self, state: FrontierState) -> Self {
        self.batch_cursor = state.len();
        self.state = state;
        self
    }

    /// Fold one snapshot's ids into the frontier.
    pub fn advance_round<I>(&mut self, ids: I) -> RoundOutcome
    where
        I: IntoIterator<Item = ItemId>,
    {
        self.rounds += 1;
        self.state.begin_round();
        let inserted = self.state.insert_all(ids);
        let new_ids = self.state.round_delta().to_vec();

        let mut terminated = false;
        if inserted == 0 {
            self.stagnant_rounds += 1;
            terminated = self.stagnant_rounds == self.stagnation_limit;
        } else {
            self.stagnant_rounds = 0;
        }

        let pending = self.state.len() - self.batch_cursor;
        let batch = if pending > self.batch_threshold {
            Some(self.take_pending())
        } else {
            None
        };

        debug!(
            "Round {}: +{} (total {}, pending {}, stagnant {})",
            self.rounds,
            inserted,
            self.state.len(),
            self.pending_len(),
            self.stagnant_rounds
        );

        RoundOutcome {
            new_ids,
            batch,
            terminated,
        }
    }

    /// Hand out every id not yet batched (used once the listing is exhausted).
    pub fn drain_pending(&mut self) -> Vec<ItemId> {
        self.take_pending()
    }

    fn take_pending(&mut self) -> Vec<ItemId> {
        let batch = self.state.since(self.batch_cursor).to_vec();
        self.batch_cursor = self.state.len();
        batch
    }

    pub fn pending_len(&self) -> usize {
        self.state.len() - self.batch_cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.stagnant_rounds >= self.stagnation_limit
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn state(&self) -> &FrontierState {
        &self.state
    }

    pub fn into_state(self) -> FrontierState {
        self.state
    }
}
