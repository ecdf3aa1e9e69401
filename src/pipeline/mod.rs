//! Batch processing pipeline.
//!
//! A [`BatchProcessor`] owns one run: it renders detail pages, extracts
//! records, uploads them and keeps the accumulator checkpointed. The
//! drivers in this module feed it ids from a scrolled listing
//! ([`Discovery`]), a JSON id list ([`fetch_slice`]) or a numeric range
//! ([`catalog_range`]).

mod accumulator;
mod batch;
pub mod config;
mod discovery;
mod fetch;

pub use accumulator::Accumulator;
pub use batch::{BatchProcessor, BatchStats};
pub use config::PipelineConfig;
pub use discovery::{Discovery, DiscoveryOutcome};
pub use fetch::{catalog_ids, catalog_range, fetch_slice, load_id_list, slice_bounds};

use thiserror::Error;

use crate::backlog::BacklogError;
use crate::checkpoint::CheckpointError;
use crate::config::ConfigError;
use crate::render::RenderError;
use crate::storage::StorageError;

/// Failures that abort a run. Everything else is logged and skipped.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("storage outage: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("backlog error: {0}")]
    Backlog(#[from] BacklogError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("listing unavailable: {0}")]
    Render(#[from] RenderError),

    #[error("invalid id list {path}: {message}")]
    InvalidInput { path: String, message: String },
}
