//! Page extraction.
//!
//! Extractors turn one rendered page into a structured record without doing
//! any I/O. Each extractor tries its strategies in a fixed order, most
//! reliable first:
//!
//! 1. the embedded `__NEXT_DATA__` data island,
//! 2. an inline `<namespace>.state = {...};` script assignment,
//! 3. CSS selector heuristics over the DOM (snaps only).
//!
//! Failures come back as [`ExtractionFailure`] values; callers log and skip.

pub mod config;
mod dom;
pub mod fields;
mod island;
mod product;
mod snap;
mod state;

pub use config::{ExtractorConfig, SnapSelectorConfig};
pub use dom::SelectorChain;
pub use island::extract_path;
pub use product::ProductExtractor;
pub use snap::SnapExtractor;
pub use state::StatePattern;

use thiserror::Error;

use crate::models::Harvested;

/// Identity of the page being extracted.
#[derive(Debug, Clone, Copy)]
pub struct ExtractContext<'a> {
    /// Item id the page was requested for.
    pub item_id: &'a str,
    /// URL the page was rendered from.
    pub source_url: &'a str,
}

/// Why a page produced no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("page is empty")]
    EmptyPage,
    #[error("no item identifier on page")]
    MissingIdentifier,
    #[error("no extraction strategy matched")]
    NoStrategyMatched,
}

/// Typed extraction failure carrying the identifier it was raised for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("extraction failed for '{raw_identifier}': {reason}")]
pub struct ExtractionFailure {
    pub reason: FailureReason,
    pub raw_identifier: String,
}

impl ExtractionFailure {
    pub fn new(reason: FailureReason, raw_identifier: impl Into<String>) -> Self {
        Self {
            reason,
            raw_identifier: raw_identifier.into(),
        }
    }
}

/// Which strategy produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    DataIsland,
    InlineState,
    Dom,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::DataIsland => "data_island",
            Strategy::InlineState => "inline_state",
            Strategy::Dom => "dom",
        }
    }
}

/// Turns one rendered detail page into a record.
pub trait PageExtractor: Send + Sync {
    type Output: Harvested;

    /// Short label used in logs and run names.
    fn kind(&self) -> &'static str;

    /// Detail page URL for an item id.
    fn detail_url(&self, item_id: &str) -> String;

    /// Run the strategies in order and report which one matched.
    fn extract_with_strategy(
        &self,
        html: &str,
        ctx: &ExtractContext<'_>,
    ) -> Result<(Self::Output, Strategy), ExtractionFailure>;

    fn extract(
        &self,
        html: &str,
        ctx: &ExtractContext<'_>,
    ) -> Result<Self::Output, ExtractionFailure> {
        self.extract_with_strategy(html, ctx).map(|(record, _)| record)
    }
}

/// Render a JSON scalar (string or number) as an identifier string.
pub(crate) fn scalar_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
