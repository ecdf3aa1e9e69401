//! Pipeline tuning.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Batch processing, checkpointing and media upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Checkpoint after every N accumulated records.
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,
    /// Checkpoint interval for catalog runs.
    #[serde(default = "default_catalog_checkpoint_interval")]
    pub catalog_checkpoint_interval: usize,
    /// Concurrent media uploads per record.
    #[serde(default = "default_media_concurrency")]
    pub media_concurrency: usize,
    /// Media fetch timeout in seconds.
    #[serde(default = "default_media_timeout")]
    pub media_timeout: u64,
    /// Remote prefix for mirrored checkpoints.
    #[serde(default = "default_remote_prefix")]
    pub remote_prefix: String,
    /// Run name for discovery; `{date}` expands to `MM_DD`.
    #[serde(default = "default_discover_run")]
    pub discover_run: String,
    /// Fixed name of the id set shared by all discovery runs.
    #[serde(default = "default_known_ids")]
    pub known_ids: String,
    /// IDs per `fetch` slice.
    #[serde(default = "default_fetch_chunk")]
    pub fetch_chunk: usize,
}

fn default_checkpoint_interval() -> usize {
    200
}

fn default_catalog_checkpoint_interval() -> usize {
    1000
}

fn default_media_concurrency() -> usize {
    4
}

fn default_media_timeout() -> u64 {
    20
}

fn default_remote_prefix() -> String {
    "files".to_string()
}

fn default_discover_run() -> String {
    "additional_{date}".to_string()
}

fn default_known_ids() -> String {
    "known_snap_ids".to_string()
}

fn default_fetch_chunk() -> usize {
    5000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: default_checkpoint_interval(),
            catalog_checkpoint_interval: default_catalog_checkpoint_interval(),
            media_concurrency: default_media_concurrency(),
            media_timeout: default_media_timeout(),
            remote_prefix: default_remote_prefix(),
            discover_run: default_discover_run(),
            known_ids: default_known_ids(),
            fetch_chunk: default_fetch_chunk(),
        }
    }
}

impl PipelineConfig {
    pub fn media_timeout(&self) -> Duration {
        Duration::from_secs(self.media_timeout)
    }

    /// Expand the discovery run template for `now`.
    pub fn discover_run_name(&self, now: DateTime<Utc>) -> String {
        self.discover_run
            .replace("{date}", &now.format("%m_%d").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_discover_run_name() {
        let config = PipelineConfig::default();
        let now = Utc.with_ymd_and_hms(2024, 5, 7, 12, 0, 0).unwrap();
        assert_eq!(config.discover_run_name(now), "additional_05_07");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: PipelineConfig = toml::from_str("checkpoint_interval = 500").unwrap();
        assert_eq!(config.checkpoint_interval, 500);
        assert_eq!(config.media_concurrency, 4);
        assert_eq!(config.remote_prefix, "files");
        assert_eq!(config.known_ids, "known_snap_ids");
    }
}
