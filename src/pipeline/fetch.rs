//! Drivers over fixed id sets: a slice of an id list, or a numeric range.

use std::path::Path;

use tracing::info;

use super::batch::{BatchProcessor, BatchStats};
use super::PipelineError;
use crate::extract::{scalar_string, PageExtractor};
use crate::models::ItemId;

/// Read a JSON array of ids (strings or numbers).
pub fn load_id_list(path: &Path) -> Result<Vec<ItemId>, PipelineError> {
    let invalid = |message: String| PipelineError::InvalidInput {
        path: path.display().to_string(),
        message,
    };
    let content = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let values: Vec<serde_json::Value> =
        serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;
    values
        .iter()
        .map(|v| scalar_string(v).ok_or_else(|| invalid(format!("not an id: {}", v))))
        .collect()
}

/// `[index * chunk, (index + 1) * chunk)` clamped to `len`.
pub fn slice_bounds(len: usize, index: usize, chunk: usize) -> (usize, usize) {
    let start = index.saturating_mul(chunk).min(len);
    let end = index.saturating_add(1).saturating_mul(chunk).min(len);
    (start, end)
}

/// Consecutive numeric ids starting at `from`.
pub fn catalog_ids(from: u64, count: u64) -> Vec<ItemId> {
    (from..from.saturating_add(count)).map(|n| n.to_string()).collect()
}

/// Process one slice of an id list, resuming past ids already stored.
pub async fn fetch_slice<E: PageExtractor>(
    processor: &mut BatchProcessor<E>,
    ids: &[ItemId],
    index: usize,
    chunk: usize,
) -> Result<BatchStats, PipelineError> {
    let (start, end) = slice_bounds(ids.len(), index, chunk);
    let slice = &ids[start..end];
    info!(
        "Run {}: ids {}..{} of {}",
        processor.run_name(),
        start,
        end,
        ids.len()
    );
    run_fixed(processor, slice).await
}

/// Process product pages for a consecutive id range.
pub async fn catalog_range<E: PageExtractor>(
    processor: &mut BatchProcessor<E>,
    from: u64,
    count: u64,
) -> Result<BatchStats, PipelineError> {
    let ids = catalog_ids(from, count);
    info!("Run {}: {} catalog ids from {}", processor.run_name(), ids.len(), from);
    run_fixed(processor, &ids).await
}

async fn run_fixed<E: PageExtractor>(
    processor: &mut BatchProcessor<E>,
    ids: &[ItemId],
) -> Result<BatchStats, PipelineError> {
    let mut frontier = processor.resume().await?;
    frontier.insert_all(ids.iter().cloned());

    processor.process(ids, &frontier).await?;
    Ok(processor.finish(&frontier).await)
}
