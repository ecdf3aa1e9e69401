//! Shared work backlog of listing URLs.
//!
//! Rows live in a `logs` table keyed by URL and move through
//! `pending -> doing -> done`. Workers on different hosts share one
//! database file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{WorkItem, WorkStatus};

/// Backlog errors.
#[derive(Debug, Error)]
pub enum BacklogError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("no backlog row for {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, BacklogError>;

/// Backlog settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BacklogConfig {
    /// Database path; defaults to `<data_dir>/backlog.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Claim with a conditional update instead of a blind write.
    #[serde(default)]
    pub strict_claim: bool,
}

/// Counters written when a row completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkCounters {
    pub total_num: i64,
    pub get_num: i64,
}

/// Row counts per status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BacklogCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub done: usize,
}

/// Backlog capability.
pub trait Backlog: Send + Sync {
    /// All rows still waiting to be claimed.
    fn select_pending(&self) -> Result<Vec<WorkItem>>;

    /// Unconditionally set a row's status, recording the worker and counters.
    fn update_status(
        &self,
        url: &str,
        status: WorkStatus,
        worker: Option<&str>,
        counters: Option<WorkCounters>,
    ) -> Result<()>;

    /// Move a row to `doing` only if it is still pending. Returns whether it won.
    fn claim_if_pending(&self, url: &str, worker: &str) -> Result<bool>;

    /// Insert URLs as pending, ignoring ones already present. Returns rows added.
    fn add(&self, urls: &[String]) -> Result<usize>;

    fn get(&self, url: &str) -> Result<Option<WorkItem>>;

    fn counts(&self) -> Result<BacklogCounts>;

    /// Return `doing` rows to `pending`. Returns rows reset.
    fn reset_stale(&self) -> Result<usize>;
}

/// SQLite-backed backlog.
pub struct SqliteBacklog {
    db_path: PathBuf,
}

impl SqliteBacklog {
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let backlog = Self {
            db_path: db_path.to_path_buf(),
        };
        backlog.init_schema()?;
        Ok(backlog)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(Duration::from_secs(10))?;
        Ok(conn)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS logs (
                url TEXT PRIMARY KEY,
                status TEXT NOT NULL DEFAULT 'pending',
                total_num INTEGER NOT NULL DEFAULT 0,
                get_num INTEGER NOT NULL DEFAULT 0,
                worker TEXT,
                updated_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_logs_status ON logs(status);
        "#,
        )?;
        Ok(())
    }
}

fn row_to_work_item(row: &rusqlite::Row) -> rusqlite::Result<WorkItem> {
    Ok(WorkItem {
        url: row.get("url")?,
        status: WorkStatus::from_str(&row.get::<_, String>("status")?).unwrap_or_default(),
        total_num: row.get("total_num")?,
        get_num: row.get("get_num")?,
        worker: row.get("worker")?,
        updated_at: row
            .get::<_, Option<String>>("updated_at")?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
    })
}

impl Backlog for SqliteBacklog {
    fn select_pending(&self) -> Result<Vec<WorkItem>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM logs WHERE status IN ('pending', 'wait') ORDER BY url ASC",
        )?;
        let rows = stmt
            .query_map([], row_to_work_item)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn update_status(
        &self,
        url: &str,
        status: WorkStatus,
        worker: Option<&str>,
        counters: Option<WorkCounters>,
    ) -> Result<()> {
        let conn = self.connect()?;
        let now = Utc::now().to_rfc3339();
        let changed = match counters {
            Some(c) => conn.execute(
                r#"UPDATE logs SET status = ?1, worker = COALESCE(?2, worker),
                   total_num = ?3, get_num = ?4, updated_at = ?5 WHERE url = ?6"#,
                params![status.as_str(), worker, c.total_num, c.get_num, now, url],
            )?,
            None => conn.execute(
                r#"UPDATE logs SET status = ?1, worker = COALESCE(?2, worker),
                   updated_at = ?3 WHERE url = ?4"#,
                params![status.as_str(), worker, now, url],
            )?,
        };
        if changed == 0 {
            return Err(BacklogError::NotFound(url.to_string()));
        }
        Ok(())
    }

    fn claim_if_pending(&self, url: &str, worker: &str) -> Result<bool> {
        let conn = self.connect()?;
        let changed = conn.execute(
            r#"UPDATE logs SET status = 'doing', worker = ?1, updated_at = ?2
               WHERE url = ?3 AND status IN ('pending', 'wait')"#,
            params![worker, Utc::now().to_rfc3339(), url],
        )?;
        Ok(changed == 1)
    }

    fn add(&self, urls: &[String]) -> Result<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let mut added = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO logs (url, status, updated_at) VALUES (?1, 'pending', ?2)",
            )?;
            let now = Utc::now().to_rfc3339();
            for url in urls {
                added += stmt.execute(params![url, now])?;
            }
        }
        tx.commit()?;
        Ok(added)
    }

    fn get(&self, url: &str) -> Result<Option<WorkItem>> {
        let conn = self.connect()?;
        let item = conn
            .query_row(
                "SELECT * FROM logs WHERE url = ?1",
                params![url],
                row_to_work_item,
            )
            .optional()?;
        Ok(item)
    }

    fn counts(&self) -> Result<BacklogCounts> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM logs GROUP BY status")?;
        let mut counts = BacklogCounts::default();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (status, n) = row?;
            let n = n as usize;
            match WorkStatus::from_str(&status) {
                Some(WorkStatus::Pending) => counts.pending += n,
                Some(WorkStatus::InProgress) => counts.in_progress += n,
                Some(WorkStatus::Done) => counts.done += n,
                None => {}
            }
        }
        Ok(counts)
    }

    fn reset_stale(&self) -> Result<usize> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE logs SET status = 'pending', updated_at = ?1 WHERE status = 'doing'",
            params![Utc::now().to_rfc3339()],
        )?;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn backlog() -> (tempfile::TempDir, SqliteBacklog) {
        let dir = tempdir().unwrap();
        let backlog = SqliteBacklog::new(&dir.path().join("backlog.db")).unwrap();
        (dir, backlog)
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_add_ignores_duplicates() {
        let (_dir, backlog) = backlog();
        assert_eq!(backlog.add(&urls(&["https://a", "https://b"])).unwrap(), 2);
        assert_eq!(backlog.add(&urls(&["https://b", "https://c"])).unwrap(), 1);
        assert_eq!(backlog.select_pending().unwrap().len(), 3);
    }

    #[test]
    fn test_status_lifecycle() {
        let (_dir, backlog) = backlog();
        backlog.add(&urls(&["https://a"])).unwrap();
        backlog
            .update_status("https://a", WorkStatus::InProgress, Some("host-1"), None)
            .unwrap();
        assert!(backlog.select_pending().unwrap().is_empty());

        backlog
            .update_status(
                "https://a",
                WorkStatus::Done,
                None,
                Some(WorkCounters {
                    total_num: 120,
                    get_num: 80,
                }),
            )
            .unwrap();
        let row = backlog.get("https://a").unwrap().unwrap();
        assert_eq!(row.status, WorkStatus::Done);
        assert_eq!(row.total_num, 120);
        assert_eq!(row.get_num, 80);
        assert_eq!(row.worker.as_deref(), Some("host-1"));
        assert!(row.updated_at.is_some());
    }

    #[test]
    fn test_update_missing_row() {
        let (_dir, backlog) = backlog();
        let err = backlog
            .update_status("https://none", WorkStatus::Done, None, None)
            .unwrap_err();
        assert!(matches!(err, BacklogError::NotFound(_)));
    }

    #[test]
    fn test_claim_if_pending_only_wins_once() {
        let (_dir, backlog) = backlog();
        backlog.add(&urls(&["https://a"])).unwrap();
        assert!(backlog.claim_if_pending("https://a", "w1").unwrap());
        assert!(!backlog.claim_if_pending("https://a", "w2").unwrap());
        assert_eq!(
            backlog.get("https://a").unwrap().unwrap().worker.as_deref(),
            Some("w1")
        );
    }

    #[test]
    fn test_legacy_wait_rows_count_as_pending() {
        let (_dir, backlog) = backlog();
        let conn = backlog.connect().unwrap();
        conn.execute(
            "INSERT INTO logs (url, status) VALUES ('https://old', 'wait')",
            [],
        )
        .unwrap();
        let pending = backlog.select_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].status, WorkStatus::Pending);
        assert_eq!(backlog.counts().unwrap().pending, 1);
    }

    #[test]
    fn test_reset_stale() {
        let (_dir, backlog) = backlog();
        backlog.add(&urls(&["https://a", "https://b"])).unwrap();
        backlog
            .update_status("https://a", WorkStatus::InProgress, Some("w"), None)
            .unwrap();
        assert_eq!(
            backlog.counts().unwrap(),
            BacklogCounts {
                pending: 1,
                in_progress: 1,
                done: 0
            }
        );
        assert_eq!(backlog.reset_stale().unwrap(), 1);
        assert_eq!(backlog.counts().unwrap().pending, 2);
    }
}
