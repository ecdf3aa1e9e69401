//! Listing discovery and backlog work commands.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use console::style;

use crate::backlog::SqliteBacklog;
use crate::claimer::{drain_backlog, worker_id, WorkClaimer};
use crate::config::Settings;
use crate::extract::SnapExtractor;
use crate::frontier::ListingIds;
use crate::pipeline::Discovery;

use super::super::helpers::{print_stats, Harness};

fn discovery(settings: &Settings, harness: &Harness) -> anyhow::Result<Discovery> {
    let listing = ListingIds::new(&settings.frontier).context("Invalid listing configuration")?;
    Ok(Discovery::new(
        harness.renderer.clone(),
        listing,
        settings.frontier.clone(),
        settings.browser.listing_options(),
    ))
}

/// Scroll one listing and harvest what it reveals.
pub async fn cmd_discover(
    settings: &Settings,
    url: &str,
    run: Option<String>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let run = run.unwrap_or_else(|| settings.pipeline.discover_run_name(Utc::now()));
    let extractor = SnapExtractor::new(&settings.extractor).context("Invalid extractor configuration")?;

    let harness = Harness::build(settings, dry_run).await?;
    let discovery = discovery(settings, &harness)?;
    let mut processor = harness
        .processor(settings, extractor, &run, settings.pipeline.checkpoint_interval)?
        .with_known_ids(harness.known_ids(settings));

    println!("{} Discovering {} (run {})", style("→").cyan(), url, run);
    let result = async {
        let seed = processor.resume().await?;
        let (outcome, frontier) = discovery.run(url, seed, &mut processor).await?;
        let stats = processor.finish(&frontier).await;
        anyhow::Ok((outcome, stats))
    }
    .await;
    harness.shutdown().await;
    let (outcome, stats) = result?;

    println!(
        "{} {} rounds, {} new ids ({} known){}",
        style("✓").green(),
        outcome.rounds,
        outcome.discovered,
        outcome.total_known,
        if outcome.exhausted {
            String::new()
        } else {
            format!(" {}", style("(round cap reached)").yellow())
        }
    );
    print_stats(&run, processor.accumulator().len(), &stats);
    Ok(())
}

/// Claim backlog rows until none are pending.
pub async fn cmd_work(settings: &Settings, index: usize, dry_run: bool) -> anyhow::Result<()> {
    let run = format!("work_{}", index);
    let extractor = SnapExtractor::new(&settings.extractor).context("Invalid extractor configuration")?;
    let backlog = SqliteBacklog::new(&settings.backlog_path).with_context(|| {
        format!("Failed to open backlog {}", settings.backlog_path.display())
    })?;
    let claimer = WorkClaimer::new(Arc::new(backlog), worker_id(), settings.backlog.strict_claim);

    let harness = Harness::build(settings, dry_run).await?;
    let discovery = discovery(settings, &harness)?;
    let mut processor =
        harness.processor(settings, extractor, &run, settings.pipeline.checkpoint_interval)?;

    println!(
        "{} Working backlog as {} (run {})",
        style("→").cyan(),
        claimer.worker(),
        run
    );
    let result = drain_backlog(&claimer, &discovery, &mut processor).await;
    harness.shutdown().await;
    let summary = result?;

    println!(
        "{} {} listings completed, {} abandoned",
        style("✓").green(),
        summary.completed,
        summary.abandoned
    );
    print_stats(&run, processor.accumulator().len(), &summary.batch);
    Ok(())
}
