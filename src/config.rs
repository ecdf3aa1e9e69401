//! Configuration management using the prefer crate for file discovery.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backlog::BacklogConfig;
use crate::extract::ExtractorConfig;
use crate::frontier::FrontierConfig;
use crate::pipeline::PipelineConfig;
use crate::render::BrowserConfig;
use crate::storage::{StorageBackend, StorageConfig};

/// Name used for config discovery and the default data directory.
pub const APP_NAME: &str = "snapharvest";

/// Default backlog database filename.
pub const DEFAULT_BACKLOG_FILENAME: &str = "backlog.db";

const CHECKPOINT_SUBDIR: &str = "checkpoints";
const OBJECTS_SUBDIR: &str = "objects";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {format} config {path}: {message}")]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },

    #[error("invalid selector for {field} '{selector}': {message}")]
    InvalidSelector {
        field: String,
        selector: String,
        message: String,
    },

    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path (checkpoints, backlog, local objects).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub frontier: FrontierConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub backlog: BacklogConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer for discovery.
    ///
    /// No discovered file means defaults; a discovered file that fails to
    /// parse is an error.
    pub async fn load() -> Result<Self, ConfigError> {
        match prefer::load(APP_NAME).await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => Self::load_from_path(path).await,
                None => Ok(Self::default()),
            },
            Err(e) => {
                tracing::debug!("No config file discovered: {}", e);
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_error = |format: &'static str, message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            format,
            message,
        };

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents).map_err(|e| parse_error("TOML", e.to_string()))?,
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents).map_err(|e| parse_error("YAML", e.to_string()))?
            }
            _ => serde_json::from_str(&contents).map_err(|e| parse_error("JSON", e.to_string()))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Directory of the config file, if loaded from one.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Local checkpoint files.
    pub checkpoint_dir: PathBuf,
    /// SQLite backlog database.
    pub backlog_path: PathBuf,
    /// Root for the local object store.
    pub objects_dir: PathBuf,
    pub browser: BrowserConfig,
    pub frontier: FrontierConfig,
    pub pipeline: PipelineConfig,
    pub extractor: ExtractorConfig,
    pub storage: StorageConfig,
    pub backlog: BacklogConfig,
}

impl Default for Settings {
    fn default() -> Self {
        // Platform data dir -> home dir -> current dir
        let data_dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAME);
        Self::with_data_dir(data_dir)
    }
}

impl Settings {
    /// Settings with default sub-configs rooted at `data_dir`.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            checkpoint_dir: data_dir.join(CHECKPOINT_SUBDIR),
            backlog_path: data_dir.join(DEFAULT_BACKLOG_FILENAME),
            objects_dir: data_dir.join(OBJECTS_SUBDIR),
            data_dir,
            browser: BrowserConfig::default(),
            frontier: FrontierConfig::default(),
            pipeline: PipelineConfig::default(),
            extractor: ExtractorConfig::default(),
            storage: StorageConfig::default(),
            backlog: BacklogConfig::default(),
        }
    }

    /// Apply a loaded config file. Relative paths resolve against `base_dir`.
    pub fn apply_config(&mut self, config: &Config, base_dir: &Path) {
        if let Some(ref data_dir) = config.data_dir {
            self.set_data_dir(config.resolve_path(data_dir, base_dir));
        }
        self.browser = config.browser.clone();
        self.frontier = config.frontier.clone();
        self.pipeline = config.pipeline.clone();
        self.extractor = config.extractor.clone();
        self.storage = config.storage.clone();
        self.backlog = config.backlog.clone();

        if let Some(ref root) = config.storage.root {
            self.objects_dir = config.resolve_path(root, base_dir);
        }
        if let Some(ref path) = config.backlog.path {
            self.backlog_path = config.resolve_path(path, base_dir);
        }
    }

    fn set_data_dir(&mut self, data_dir: PathBuf) {
        self.checkpoint_dir = data_dir.join(CHECKPOINT_SUBDIR);
        self.backlog_path = data_dir.join(DEFAULT_BACKLOG_FILENAME);
        self.objects_dir = data_dir.join(OBJECTS_SUBDIR);
        self.data_dir = data_dir;
    }

    /// Apply environment overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides from an arbitrary lookup.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = var("SNAPHARVEST_DATA_DIR") {
            let expanded = shellexpand::tilde(&dir).into_owned();
            tracing::debug!("Using SNAPHARVEST_DATA_DIR from environment: {}", expanded);
            self.set_data_dir(PathBuf::from(expanded));
        }
        if let Some(bucket) = var("SNAPHARVEST_BUCKET") {
            self.storage.bucket = Some(bucket);
        }
        if let Some(backend) = var("SNAPHARVEST_STORAGE") {
            self.storage.backend =
                StorageBackend::from_str(&backend).ok_or_else(|| ConfigError::InvalidValue {
                    key: "SNAPHARVEST_STORAGE".to_string(),
                    message: format!("expected 'local' or 'gcs', got '{}'", backend),
                })?;
        }
        if let Some(token) = var("GCS_ACCESS_TOKEN") {
            self.storage.access_token = Some(token);
        }
        if let Some(path) = var("SNAPHARVEST_BACKLOG_DB") {
            self.backlog_path = PathBuf::from(shellexpand::tilde(&path).into_owned());
        }
        if let Some(url) = var("CHROME_REMOTE_URL") {
            self.browser.remote_url = Some(url);
        }
        Ok(())
    }

    /// Ensure local directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for dir in [&self.data_dir, &self.checkpoint_dir] {
            fs::create_dir_all(dir).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!("Failed to create directory '{}': {}", dir.display(), e),
                )
            })?;
        }
        Ok(())
    }
}

/// Options controlling where configuration comes from.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file (`--config`).
    pub config_path: Option<PathBuf>,
    /// Resolve relative paths against the working directory instead of the
    /// config file location.
    pub use_cwd: bool,
}

/// Load settings: explicit file or discovered file, then environment.
pub async fn load_settings(options: &LoadOptions) -> Result<(Settings, Config), ConfigError> {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await?,
        None => Config::load().await?,
    };

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base_dir = if options.use_cwd {
        cwd
    } else {
        config.base_dir().unwrap_or(cwd)
    };

    let mut settings = Settings::default();
    settings.apply_config(&config, &base_dir);
    settings.apply_env()?;

    if let Some(ref path) = config.source_path {
        tracing::debug!("Loaded config from {}", path.display());
    }

    Ok((settings, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[tokio::test]
    async fn test_load_toml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapharvest.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
data_dir = "data"

[frontier]
stagnation_rounds = 6
batch_threshold = 10

[pipeline]
checkpoint_interval = 500

[storage]
backend = "gcs"
bucket = "my-bucket"
"#
        )
        .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.frontier.stagnation_rounds, 6);
        assert_eq!(config.frontier.batch_threshold, 10);
        assert_eq!(config.frontier.scroll_steps, 5);
        assert_eq!(config.pipeline.checkpoint_interval, 500);
        assert_eq!(config.storage.backend, StorageBackend::Gcs);

        let mut settings = Settings::default();
        settings.apply_config(&config, &config.base_dir().unwrap());
        assert_eq!(settings.data_dir, dir.path().join("data"));
        assert_eq!(settings.checkpoint_dir, dir.path().join("data").join("checkpoints"));
    }

    #[tokio::test]
    async fn test_load_yaml_and_json_config() {
        let dir = tempfile::tempdir().unwrap();

        let yaml = dir.path().join("c.yaml");
        fs::write(&yaml, "browser:\n  timeout: 3\n  block_images: false\n").unwrap();
        let config = Config::load_from_path(&yaml).await.unwrap();
        assert_eq!(config.browser.timeout, 3);
        assert!(!config.browser.block_images);
        assert!(config.browser.block_stylesheets);

        let json = dir.path().join("c.json");
        fs::write(&json, r#"{"backlog": {"strict_claim": true}}"#).unwrap();
        let config = Config::load_from_path(&json).await.unwrap();
        assert!(config.backlog.strict_claim);
    }

    #[tokio::test]
    async fn test_invalid_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "frontier = [").unwrap();
        let err = Config::load_from_path(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { format: "TOML", .. }));

        let missing = Config::load_from_path(&dir.path().join("nope.json")).await;
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SNAPHARVEST_DATA_DIR", "/tmp/harvest"),
            ("SNAPHARVEST_BUCKET", "env-bucket"),
            ("SNAPHARVEST_STORAGE", "gcs"),
            ("GCS_ACCESS_TOKEN", "tok"),
            ("CHROME_REMOTE_URL", "ws://localhost:9222"),
            ("SNAPHARVEST_BACKLOG_DB", ""),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings
            .apply_env_with(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.data_dir, PathBuf::from("/tmp/harvest"));
        assert_eq!(settings.backlog_path, PathBuf::from("/tmp/harvest/backlog.db"));
        assert_eq!(settings.storage.bucket.as_deref(), Some("env-bucket"));
        assert_eq!(settings.storage.backend, StorageBackend::Gcs);
        assert_eq!(settings.storage.access_token.as_deref(), Some("tok"));
        assert_eq!(settings.browser.remote_url.as_deref(), Some("ws://localhost:9222"));
    }

    #[test]
    fn test_invalid_storage_env_rejected() {
        let mut settings = Settings::default();
        let result = settings.apply_env_with(|k| {
            (k == "SNAPHARVEST_STORAGE").then(|| "s3".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_resolve_path() {
        let config = Config::default();
        let base = Path::new("/etc/snapharvest");
        assert_eq!(config.resolve_path("/abs", base), PathBuf::from("/abs"));
        assert_eq!(config.resolve_path("rel", base), PathBuf::from("/etc/snapharvest/rel"));
    }
}
