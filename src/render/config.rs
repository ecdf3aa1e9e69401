//! Renderer configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Renderer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Rendering engine.
    #[serde(default)]
    pub engine: RenderEngine,

    /// Run in headless mode (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to an existing browser instead of launching one.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// User agent override; "impersonate" picks a real browser agent.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Detail page timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Listing page timeout in seconds.
    #[serde(default = "default_listing_timeout")]
    pub listing_timeout: u64,

    /// Wait for this CSS selector before snapshotting; `body` is the fallback.
    #[serde(default = "default_ready_selector")]
    pub ready_selector: String,

    #[serde(default = "default_true")]
    pub block_images: bool,

    #[serde(default = "default_true")]
    pub block_stylesheets: bool,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    /// Accept-Language sent by the browser.
    #[serde(default = "default_language")]
    pub language: String,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            engine: RenderEngine::default(),
            headless: default_headless(),
            proxy: None,
            remote_url: None,
            user_agent: None,
            timeout: default_timeout(),
            listing_timeout: default_listing_timeout(),
            ready_selector: default_ready_selector(),
            block_images: true,
            block_stylesheets: true,
            window_width: default_window_width(),
            window_height: default_window_height(),
            language: default_language(),
            chrome_args: Vec::new(),
        }
    }
}

impl BrowserConfig {
    /// Options for rendering one detail page.
    pub fn page_options(&self) -> RenderOptions {
        RenderOptions {
            timeout: Duration::from_secs(self.timeout),
            block_images: self.block_images,
            block_stylesheets: self.block_stylesheets,
            ready_selector: Some(self.ready_selector.clone()).filter(|s| !s.is_empty()),
        }
    }

    /// Options for opening a listing page. Images stay enabled so lazy
    /// cards keep loading while scrolling.
    pub fn listing_options(&self) -> RenderOptions {
        RenderOptions {
            timeout: Duration::from_secs(self.listing_timeout),
            block_images: false,
            block_stylesheets: self.block_stylesheets,
            ready_selector: None,
        }
    }
}

fn default_headless() -> bool {
    true
}

fn default_timeout() -> u64 {
    8
}

fn default_listing_timeout() -> u64 {
    12
}

fn default_ready_selector() -> String {
    "script#__NEXT_DATA__".to_string()
}

fn default_true() -> bool {
    true
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    2000
}

fn default_language() -> String {
    "ko-KR".to_string()
}

/// Rendering engines.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RenderEngine {
    /// Headless Chrome over CDP (default).
    #[default]
    Browser,
    /// Plain HTTP GET; no script execution and no scrolling.
    Http,
}

/// Per-render options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Hard bound on the whole render.
    pub timeout: Duration,
    pub block_images: bool,
    pub block_stylesheets: bool,
    /// Marker that signals readiness; falls back to `body`.
    pub ready_selector: Option<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        BrowserConfig::default().page_options()
    }
}

/// Scroll plan for one listing round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollPlan {
    pub steps: u32,
    pub step_px: u32,
    pub pause: Duration,
    pub settle: Duration,
}
