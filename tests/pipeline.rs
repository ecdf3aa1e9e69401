//! End-to-end pipeline tests over scripted pages and in-memory storage.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use snapharvest::backlog::{Backlog, SqliteBacklog};
use snapharvest::checkpoint::{Checkpoint, CheckpointStore, KnownIdsStore};
use snapharvest::claimer::{drain_backlog, WorkClaimer};
use snapharvest::extract::{ExtractorConfig, SnapExtractor};
use snapharvest::frontier::{FrontierConfig, FrontierState, ListingIds};
use snapharvest::models::{account_uuid, Record, WorkStatus};
use snapharvest::pipeline::{BatchProcessor, Discovery, PipelineConfig, PipelineError};
use snapharvest::render::{ListingSession, RenderError, RenderOptions, Renderer, ScrollPlan};
use snapharvest::storage::{MemoryStore, ObjectStore, StorageResult};
use snapharvest::upload::{MediaError, MediaPayload, MediaSource, UploadGateway};

const SNAP_BASE: &str = "https://www.musinsa.com/snap/";

/// Serves snap detail cards and scripted listing snapshots.
#[derive(Default)]
struct FakeSite {
    listings: HashMap<String, Vec<Vec<&'static str>>>,
    users: HashMap<String, String>,
    /// Detail pages that time out.
    timeouts: HashSet<String>,
}

impl FakeSite {
    fn listing(mut self, url: &str, rounds: Vec<Vec<&'static str>>) -> Self {
        self.listings.insert(url.to_string(), rounds);
        self
    }

    fn user(mut self, id: &str, name: &str) -> Self {
        self.users.insert(id.to_string(), name.to_string());
        self
    }

    fn timeout(mut self, id: &str) -> Self {
        self.timeouts.insert(id.to_string());
        self
    }
}

fn listing_html(ids: &[&str]) -> String {
    ids.iter()
        .map(|id| format!(r#"<a href="/snap/{}?tab=1">{}</a>"#, id, id))
        .collect()
}

#[async_trait]
impl Renderer for FakeSite {
    async fn render(&self, url: &str, _: &RenderOptions) -> Result<String, RenderError> {
        let id = url.trim_start_matches(SNAP_BASE);
        if self.timeouts.contains(id) {
            return Err(RenderError::Timeout {
                url: url.to_string(),
                seconds: 8,
            });
        }
        let user = self
            .users
            .get(id)
            .cloned()
            .unwrap_or_else(|| format!("user_{}", id));
        Ok(format!(
            r#"<html><body><div class="sc-7659943b-0" data-key="{}">
                <div class="sc-faa3da62-0">{}</div>
                <span class="sc-7659943b-1">170cm/60kg · 웜톤</span>
            </div></body></html>"#,
            id, user
        ))
    }

    async fn open_listing(
        &self,
        url: &str,
        _: &RenderOptions,
    ) -> Result<Box<dyn ListingSession>, RenderError> {
        let rounds = self.listings.get(url).ok_or_else(|| RenderError::Navigation {
            url: url.to_string(),
            message: "404".to_string(),
        })?;
        Ok(Box::new(ScriptedListing {
            pages: rounds.iter().map(|ids| listing_html(ids)).collect(),
            next: 0,
        }))
    }
}

/// Returns one scripted snapshot per round, repeating the last one.
struct ScriptedListing {
    pages: Vec<String>,
    next: usize,
}

#[async_trait]
impl ListingSession for ScriptedListing {
    async fn advance(&mut self, _: &ScrollPlan) -> Result<(), RenderError> {
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<String, RenderError> {
        let page = self
            .pages
            .get(self.next.min(self.pages.len().saturating_sub(1)))
            .cloned()
            .unwrap_or_default();
        self.next += 1;
        Ok(page)
    }

    async fn close(self: Box<Self>) {}
}

struct NoMedia;

#[async_trait]
impl MediaSource for NoMedia {
    async fn fetch(&self, url: &str) -> Result<MediaPayload, MediaError> {
        Err(MediaError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

/// Counts writes under a prefix before delegating to a memory store.
struct CountingStore {
    inner: MemoryStore,
    prefix: &'static str,
    writes: AtomicUsize,
}

#[async_trait]
impl ObjectStore for CountingStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()> {
        if path.starts_with(self.prefix) {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.put(path, bytes, content_type).await
    }

    async fn get(&self, path: &str) -> StorageResult<Vec<u8>> {
        self.inner.get(path).await
    }

    async fn copy(&self, src: &str, dst: &str) -> StorageResult<()> {
        self.inner.copy(src, dst).await
    }

    fn describe(&self) -> String {
        "counting".to_string()
    }
}

fn frontier_config(batch_threshold: usize) -> FrontierConfig {
    FrontierConfig {
        id_pattern: "^[A-Za-z0-9]+$".to_string(),
        batch_threshold,
        stagnation_rounds: 4,
        scroll_pause_ms: 0,
        settle_ms: 0,
        ..Default::default()
    }
}

fn processor(
    site: &Arc<FakeSite>,
    store: Arc<dyn ObjectStore>,
    dir: &Path,
    run: &str,
    interval: usize,
) -> BatchProcessor<SnapExtractor> {
    let extractor = SnapExtractor::new(&ExtractorConfig::default()).unwrap();
    let gateway = UploadGateway::new(store.clone(), Arc::new(NoMedia), 4);
    let checkpoints = CheckpointStore::new(dir, run).with_remote(store, "files");
    BatchProcessor::new(
        site.clone(),
        extractor,
        gateway,
        checkpoints,
        RenderOptions::default(),
        interval,
    )
}

fn discovery(site: &Arc<FakeSite>, config: FrontierConfig) -> Discovery {
    let listing = ListingIds::new(&config).unwrap();
    Discovery::new(site.clone(), listing, config, RenderOptions::default())
}

#[tokio::test]
async fn test_duplicate_listing_ids_yield_one_record() {
    let url = "https://www.musinsa.com/snap/recent";
    let site = Arc::new(FakeSite::default().listing(url, vec![vec!["A1"], vec!["A2", "A1"]]));
    let store = MemoryStore::new();
    let dir = tempfile::tempdir().unwrap();

    let mut p = processor(&site, Arc::new(store.clone()), dir.path(), "additional_05_07", 200);
    let discovery = discovery(&site, frontier_config(50));

    let (outcome, frontier) = discovery.run(url, FrontierState::new(), &mut p).await.unwrap();
    p.finish(&frontier).await;

    assert_eq!(frontier.len(), 2);
    assert_eq!(outcome.discovered, 2);
    assert!(outcome.exhausted);
    // Two growth rounds, then four stagnant ones.
    assert_eq!(outcome.rounds, 6);

    let a1 = p
        .accumulator()
        .records()
        .iter()
        .filter(|r| r.record.snap_id == "A1")
        .count();
    assert_eq!(a1, 1);
    assert_eq!(p.accumulator().len(), 2);

    let stored = &p.accumulator().records()[0];
    assert_eq!(stored.record.height, "170cm");
    assert_eq!(stored.record.tone, "웜톤");
    assert_eq!(
        stored.json_path,
        format!("json/member/{}/A1.json", account_uuid("user_A1"))
    );
    assert!(store.object(&stored.json_path).is_some());

    let saved: Checkpoint<Record> = CheckpointStore::new(dir.path(), "additional_05_07")
        .load()
        .await
        .unwrap()
        .unwrap();
    assert!(saved.complete);
    assert_eq!(saved.known_ids, vec!["A1".to_string(), "A2".to_string()]);
}

#[tokio::test]
async fn test_checkpoint_cadence_for_520_records() {
    let site = Arc::new(FakeSite::default());
    let store = Arc::new(CountingStore {
        inner: MemoryStore::new(),
        prefix: "files/",
        writes: AtomicUsize::new(0),
    });
    let dir = tempfile::tempdir().unwrap();
    let mut p = processor(&site, store.clone(), dir.path(), "data_0", 200);

    let ids: Vec<String> = (1..=520).map(|n| n.to_string()).collect();
    let frontier = FrontierState::from_ids(ids.clone());
    p.process(&ids, &frontier).await.unwrap();

    assert_eq!(p.stats().checkpoints, 2);
    assert_eq!(store.writes.load(Ordering::SeqCst), 2);

    p.finish(&frontier).await;
    assert_eq!(store.writes.load(Ordering::SeqCst), 3);
    assert_eq!(p.accumulator().len(), 520);
}

#[tokio::test]
async fn test_resume_after_storage_outage() {
    let url = "https://www.musinsa.com/snap/recent";
    let all = vec!["1", "2", "3", "4", "5", "6"];
    let site = Arc::new(
        FakeSite::default()
            .listing(url, vec![all.clone()])
            .user("5", "broken"),
    );
    let dir = tempfile::tempdir().unwrap();

    // First run dies on record 5 after checkpointing four records.
    let failing = MemoryStore::new();
    failing.fail_prefix(format!("json/member/{}/", account_uuid("broken")));
    let mut first = processor(&site, Arc::new(failing), dir.path(), "run", 2);
    let seed = first.resume().await.unwrap();
    let err = discovery(&site, frontier_config(2))
        .run(url, seed, &mut first)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Storage(_)));
    assert_eq!(first.accumulator().len(), 4);

    // Second run picks up from the local checkpoint.
    let healthy = MemoryStore::new();
    let mut second = processor(&site, Arc::new(healthy.clone()), dir.path(), "run", 2);
    let seed = second.resume().await.unwrap();
    assert_eq!(seed.len(), 4);
    assert_eq!(second.accumulator().len(), 4);

    let (outcome, frontier) = discovery(&site, frontier_config(2))
        .run(url, seed, &mut second)
        .await
        .unwrap();
    second.finish(&frontier).await;

    assert_eq!(outcome.discovered, 2);
    assert_eq!(outcome.newly_yielded, 2);
    let ids: Vec<&str> = second
        .accumulator()
        .records()
        .iter()
        .map(|r| r.record.snap_id.as_str())
        .collect();
    assert_eq!(ids, all);
    // Only the two missing records were written on the second run.
    assert_eq!(
        healthy
            .paths()
            .iter()
            .filter(|p| p.starts_with("json/"))
            .count(),
        2
    );
}

#[tokio::test]
async fn test_work_loop_drains_backlog() {
    let first = "https://www.musinsa.com/snap/listing-a";
    let second = "https://www.musinsa.com/snap/listing-b";
    let site = Arc::new(
        FakeSite::default()
            .listing(first, vec![vec!["10", "11"], vec!["10", "11", "12"]])
            .listing(second, vec![vec!["11", "12", "13"]]),
    );
    let dir = tempfile::tempdir().unwrap();
    let backlog = Arc::new(SqliteBacklog::new(&dir.path().join("backlog.db")).unwrap());
    backlog
        .add(&[
            first.to_string(),
            second.to_string(),
            "https://www.musinsa.com/snap/gone".to_string(),
        ])
        .unwrap();

    let claimer = WorkClaimer::new(backlog.clone(), "test:1", false);
    let mut p = processor(&site, Arc::new(MemoryStore::new()), dir.path(), "work_0", 200);
    let summary = drain_backlog(&claimer, &discovery(&site, frontier_config(50)), &mut p)
        .await
        .unwrap();

    assert_eq!(summary.completed, 2);
    assert_eq!(summary.abandoned, 1);
    assert_eq!(p.accumulator().len(), 4);

    let a = backlog.get(first).unwrap().unwrap();
    let b = backlog.get(second).unwrap().unwrap();
    assert_eq!(a.status, WorkStatus::Done);
    assert_eq!(b.status, WorkStatus::Done);
    // Every id is counted once across both listings.
    assert_eq!(a.total_num + b.total_num, 4);
    assert_eq!(a.get_num + b.get_num, 4);
    assert_eq!(
        backlog
            .get("https://www.musinsa.com/snap/gone")
            .unwrap()
            .unwrap()
            .status,
        WorkStatus::InProgress
    );

    let saved: Checkpoint<Record> = CheckpointStore::new(dir.path(), "work_0")
        .load()
        .await
        .unwrap()
        .unwrap();
    assert!(saved.complete);
    assert_eq!(saved.known_ids.len(), 4);
}

#[tokio::test]
async fn test_discover_on_consecutive_days_skips_known_ids() {
    let url = "https://www.musinsa.com/snap/recent";
    let store = MemoryStore::new();
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default();
    let known = || {
        KnownIdsStore::new(dir.path(), config.known_ids.clone())
            .with_remote(Arc::new(store.clone()), "files")
    };
    let day = |d: u32| {
        use chrono::TimeZone;
        config.discover_run_name(chrono::Utc.with_ymd_and_hms(2025, 5, d, 9, 0, 0).unwrap())
    };

    let monday = Arc::new(FakeSite::default().listing(url, vec![vec!["1", "2"]]));
    let mut first = processor(&monday, Arc::new(store.clone()), dir.path(), &day(7), 200)
        .with_known_ids(known());
    let seed = first.resume().await.unwrap();
    assert!(seed.is_empty());
    let (outcome, frontier) = discovery(&monday, frontier_config(50))
        .run(url, seed, &mut first)
        .await
        .unwrap();
    first.finish(&frontier).await;
    assert_eq!(outcome.newly_yielded, 2);

    let tuesday = Arc::new(FakeSite::default().listing(url, vec![vec!["3", "1", "2"]]));
    let mut second = processor(&tuesday, Arc::new(store.clone()), dir.path(), &day(8), 200)
        .with_known_ids(known());
    let seed = second.resume().await.unwrap();
    assert_eq!(seed.len(), 2);
    let (outcome, frontier) = discovery(&tuesday, frontier_config(50))
        .run(url, seed, &mut second)
        .await
        .unwrap();
    second.finish(&frontier).await;

    assert_eq!(outcome.discovered, 1);
    assert_eq!(outcome.newly_yielded, 1);
    assert_eq!(second.stats().attempted, 1);
    let ids: Vec<&str> = second
        .accumulator()
        .records()
        .iter()
        .map(|r| r.record.snap_id.as_str())
        .collect();
    assert_eq!(ids, vec!["3"]);

    // Day runs keep their own record lists; the id set is shared.
    assert!(store.object("files/additional_05_07.json").is_some());
    assert!(store.object("files/additional_05_08.json").is_some());
    assert_eq!(known().load().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_render_timeout_retried_after_resume() {
    let url = "https://www.musinsa.com/snap/recent";
    let store = MemoryStore::new();
    let dir = tempfile::tempdir().unwrap();

    let flaky = Arc::new(
        FakeSite::default()
            .listing(url, vec![vec!["1", "2", "3", "4"]])
            .timeout("3"),
    );
    let mut first = processor(&flaky, Arc::new(store.clone()), dir.path(), "run", 200);
    let seed = first.resume().await.unwrap();
    let (_, frontier) = discovery(&flaky, frontier_config(50))
        .run(url, seed, &mut first)
        .await
        .unwrap();
    first.finish(&frontier).await;
    assert_eq!(first.stats().render_failures, 1);
    assert_eq!(first.accumulator().len(), 3);

    let saved: Checkpoint<Record> = CheckpointStore::new(dir.path(), "run")
        .load()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saved.known_ids, vec!["1", "2", "4"]);

    let healthy = Arc::new(FakeSite::default().listing(url, vec![vec!["1", "2", "3", "4"]]));
    let mut second = processor(&healthy, Arc::new(store.clone()), dir.path(), "run", 200);
    let seed = second.resume().await.unwrap();
    let (outcome, frontier) = discovery(&healthy, frontier_config(50))
        .run(url, seed, &mut second)
        .await
        .unwrap();
    second.finish(&frontier).await;

    assert_eq!(outcome.discovered, 1);
    assert_eq!(outcome.newly_yielded, 1);
    assert_eq!(second.stats().render_failures, 0);
    assert_eq!(second.accumulator().len(), 4);
    assert!(second
        .accumulator()
        .records()
        .iter()
        .any(|r| r.record.snap_id == "3"));
}
