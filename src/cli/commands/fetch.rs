//! Fixed id set commands.

use std::path::Path;

use anyhow::Context;
use console::style;

use crate::config::Settings;
use crate::extract::{PageExtractor, ProductExtractor, SnapExtractor};
use crate::pipeline::{catalog_range, fetch_slice, load_id_list};

use super::super::helpers::{print_stats, Harness};
use super::ItemKind;

/// Harvest one slice of an id list.
pub async fn cmd_fetch(
    settings: &Settings,
    ids_path: &Path,
    index: usize,
    chunk: Option<usize>,
    kind: ItemKind,
    dry_run: bool,
) -> anyhow::Result<()> {
    let ids = load_id_list(ids_path)?;
    let chunk = chunk.unwrap_or(settings.pipeline.fetch_chunk).max(1);
    let run = format!("data_{}", index);

    match kind {
        ItemKind::Snap => {
            let extractor = SnapExtractor::new(&settings.extractor)
                .context("Invalid extractor configuration")?;
            fetch_with(settings, extractor, &ids, index, chunk, &run, dry_run).await
        }
        ItemKind::Product => {
            let extractor = ProductExtractor::new(&settings.extractor)
                .context("Invalid extractor configuration")?;
            fetch_with(settings, extractor, &ids, index, chunk, &run, dry_run).await
        }
    }
}

async fn fetch_with<E: PageExtractor>(
    settings: &Settings,
    extractor: E,
    ids: &[String],
    index: usize,
    chunk: usize,
    run: &str,
    dry_run: bool,
) -> anyhow::Result<()> {
    let harness = Harness::build(settings, dry_run).await?;
    let mut processor =
        harness.processor(settings, extractor, run, settings.pipeline.checkpoint_interval)?;

    println!(
        "{} Fetching slice {} of {} ids (run {})",
        style("→").cyan(),
        index,
        ids.len(),
        run
    );
    let result = fetch_slice(&mut processor, ids, index, chunk).await;
    harness.shutdown().await;
    let stats = result?;

    print_stats(run, processor.accumulator().len(), &stats);
    Ok(())
}

/// Harvest product pages for a consecutive id range.
pub async fn cmd_catalog(
    settings: &Settings,
    from: u64,
    count: u64,
    dry_run: bool,
) -> anyhow::Result<()> {
    let run = format!("catalog_{}", from);
    let extractor =
        ProductExtractor::new(&settings.extractor).context("Invalid extractor configuration")?;

    let harness = Harness::build(settings, dry_run).await?;
    let mut processor = harness.processor(
        settings,
        extractor,
        &run,
        settings.pipeline.catalog_checkpoint_interval,
    )?;

    println!(
        "{} Cataloging {} products from {} (run {})",
        style("→").cyan(),
        count,
        from,
        run
    );
    let result = catalog_range(&mut processor, from, count).await;
    harness.shutdown().await;
    let stats = result?;

    print_stats(&run, processor.accumulator().len(), &stats);
    Ok(())
}
