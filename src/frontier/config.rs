//! Frontier configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::render::ScrollPlan;

/// Listing discovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierConfig {
    /// Item anchors on the listing, tried in order.
    #[serde(default = "default_anchor_selectors")]
    pub anchor_selectors: Vec<String>,

    /// Pattern a path segment must match to count as an item id.
    #[serde(default = "default_id_pattern")]
    pub id_pattern: String,

    /// Consecutive zero-growth rounds that end a session.
    #[serde(default = "default_stagnation_rounds")]
    pub stagnation_rounds: usize,

    /// New ids required (strictly more than) before a batch is processed.
    #[serde(default = "default_batch_threshold")]
    pub batch_threshold: usize,

    #[serde(default = "default_scroll_steps")]
    pub scroll_steps: u32,

    #[serde(default = "default_scroll_step_px")]
    pub scroll_step_px: u32,

    #[serde(default = "default_scroll_pause_ms")]
    pub scroll_pause_ms: u64,

    /// Wait after the last scroll step before snapshotting.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Hard cap on rounds per listing session.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
}

impl Default for FrontierConfig {
    fn default() -> Self {
        Self {
            anchor_selectors: default_anchor_selectors(),
            id_pattern: default_id_pattern(),
            stagnation_rounds: default_stagnation_rounds(),
            batch_threshold: default_batch_threshold(),
            scroll_steps: default_scroll_steps(),
            scroll_step_px: default_scroll_step_px(),
            scroll_pause_ms: default_scroll_pause_ms(),
            settle_ms: default_settle_ms(),
            max_rounds: default_max_rounds(),
        }
    }
}

impl FrontierConfig {
    pub fn scroll_plan(&self) -> ScrollPlan {
        ScrollPlan {
            steps: self.scroll_steps,
            step_px: self.scroll_step_px,
            pause: Duration::from_millis(self.scroll_pause_ms),
            settle: Duration::from_millis(self.settle_ms),
        }
    }
}

fn default_anchor_selectors() -> Vec<String> {
    vec![
        "a[class*='SnapFeedCard__Link']".to_string(),
        "a[href*='/snap/']".to_string(),
    ]
}

fn default_id_pattern() -> String {
    r"^\d+$".to_string()
}

fn default_stagnation_rounds() -> usize {
    4
}

fn default_batch_threshold() -> usize {
    50
}

fn default_scroll_steps() -> u32 {
    5
}

fn default_scroll_step_px() -> u32 {
    500
}

fn default_scroll_pause_ms() -> u64 {
    300
}

fn default_settle_ms() -> u64 {
    1000
}

fn default_max_rounds() -> usize {
    10_000
}
