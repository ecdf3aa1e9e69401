//! Headless Chrome renderer over the DevTools protocol (chromiumoxide).

#[cfg(feature = "browser")]
use std::time::Duration;

#[cfg(feature = "browser")]
use async_trait::async_trait;
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::{
    SetBlockedUrLsParams, SetUserAgentOverrideParams,
};
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig as CdpConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tokio::sync::Mutex;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

use super::config::BrowserConfig;
#[cfg(feature = "browser")]
use super::config::{RenderOptions, ScrollPlan};
#[cfg(feature = "browser")]
use super::user_agent::resolve_user_agent;
#[cfg(feature = "browser")]
use super::{ListingSession, Renderer};
use super::RenderError;

#[cfg(feature = "browser")]
const IMAGE_PATTERNS: &[&str] = &[
    "*.jpg", "*.jpeg", "*.png", "*.gif", "*.webp", "*.svg", "*.avif",
];

#[cfg(feature = "browser")]
const STYLESHEET_PATTERNS: &[&str] = &["*.css"];

#[cfg(feature = "browser")]
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Chrome-backed renderer.
#[cfg(feature = "browser")]
pub struct BrowserRenderer {
    user_agent: String,
    browser: Mutex<Browser>,
}

#[cfg(feature = "browser")]
impl BrowserRenderer {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    /// Launch a local browser, or connect to `remote_url` when configured.
    pub async fn launch(config: BrowserConfig) -> Result<Self, RenderError> {
        let browser = match config.remote_url.clone() {
            Some(url) => Self::connect_remote(&url).await?,
            None => Self::launch_local(&config).await?,
        };
        Ok(Self {
            user_agent: resolve_user_agent(config.user_agent.as_deref()),
            browser: Mutex::new(browser),
        })
    }

    fn find_chrome() -> Result<std::path::PathBuf, RenderError> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        info!("Found Chrome in PATH: {}", path);
                        return Ok(std::path::PathBuf::from(path));
                    }
                }
            }
        }

        Err(RenderError::Browser(
            "Chrome/Chromium not found; install it or set CHROME_REMOTE_URL".to_string(),
        ))
    }

    async fn launch_local(config: &BrowserConfig) -> Result<Browser, RenderError> {
        info!("Launching browser (headless={})", config.headless);

        let mut builder = CdpConfig::builder()
            .chrome_executable(Self::find_chrome()?)
            .window_size(config.window_width, config.window_height);

        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(ref proxy) = config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg(format!("--lang={}", config.language));

        for arg in &config.chrome_args {
            builder = builder.arg(arg);
        }

        let cdp_config = builder
            .build()
            .map_err(|e| RenderError::Browser(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| RenderError::Browser(format!("Failed to launch browser: {}", e)))?;

        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(browser)
    }

    async fn connect_remote(url: &str) -> Result<Browser, RenderError> {
        info!("Connecting to remote browser at {}", url);

        // The DevTools socket URL comes from /json/version.
        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await
            .map_err(|e| RenderError::Browser(format!("Failed to reach remote browser: {}", e)))?
            .json()
            .await
            .map_err(|e| RenderError::Browser(format!("Bad browser version info: {}", e)))?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| RenderError::Browser("No webSocketDebuggerUrl in response".into()))?;

        let (browser, mut handler) = Browser::connect(ws_url)
            .await
            .map_err(|e| RenderError::Browser(format!("Failed to connect: {}", e)))?;

        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(browser)
    }

    /// Open a blank tab with the user agent and resource blocking applied.
    async fn open_page(&self, options: &RenderOptions) -> Result<Page, RenderError> {
        let page = {
            let browser = self.browser.lock().await;
            browser.new_page("about:blank").await.map_err(browser_error)?
        };

        page.execute(SetUserAgentOverrideParams::new(self.user_agent.clone()))
            .await
            .map_err(browser_error)?;

        let mut blocked: Vec<String> = Vec::new();
        if options.block_images {
            blocked.extend(IMAGE_PATTERNS.iter().map(|p| p.to_string()));
        }
        if options.block_stylesheets {
            blocked.extend(STYLESHEET_PATTERNS.iter().map(|p| p.to_string()));
        }
        if !blocked.is_empty() {
            if let Err(e) = page.execute(SetBlockedUrLsParams::new(blocked)).await {
                warn!("Could not enable resource blocking: {}", e);
            }
        }

        Ok(page)
    }

    async fn navigate(&self, page: &Page, url: &str, options: &RenderOptions) -> Result<(), RenderError> {
        debug!("Navigating to {}", url);
        let nav_params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| RenderError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        page.execute(nav_params)
            .await
            .map_err(|e| RenderError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        self.wait_ready(page, options).await;
        Ok(())
    }

    /// Wait for the readiness marker, then fall back to `body`.
    async fn wait_ready(&self, page: &Page, options: &RenderOptions) {
        if let Some(ref selector) = options.ready_selector {
            let marker_wait = options.timeout.mul_f32(0.75);
            match tokio::time::timeout(marker_wait, poll_selector(page, selector)).await {
                Ok(()) => return,
                Err(_) => debug!("Marker {} not present, waiting for body", selector),
            }
        }
        poll_selector(page, "body").await;
    }

    fn timeout_error(url: &str, options: &RenderOptions) -> RenderError {
        RenderError::Timeout {
            url: url.to_string(),
            seconds: options.timeout.as_secs(),
        }
    }
}

#[cfg(feature = "browser")]
async fn poll_selector(page: &Page, selector: &str) {
    while page.find_element(selector).await.is_err() {
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(feature = "browser")]
fn browser_error(e: chromiumoxide::error::CdpError) -> RenderError {
    RenderError::Browser(e.to_string())
}

#[cfg(feature = "browser")]
#[async_trait]
impl Renderer for BrowserRenderer {
    async fn render(&self, url: &str, options: &RenderOptions) -> Result<String, RenderError> {
        let page = tokio::time::timeout(options.timeout, self.open_page(options))
            .await
            .map_err(|_| Self::timeout_error(url, options))??;

        let result = tokio::time::timeout(options.timeout, async {
            self.navigate(&page, url, options).await?;
            page.content().await.map_err(browser_error)
        })
        .await;

        // Close the tab to prevent accumulation
        let _ = page.close().await;

        result.map_err(|_| Self::timeout_error(url, options))?
    }

    async fn open_listing(
        &self,
        url: &str,
        options: &RenderOptions,
    ) -> Result<Box<dyn ListingSession>, RenderError> {
        let page = tokio::time::timeout(options.timeout, self.open_page(options))
            .await
            .map_err(|_| Self::timeout_error(url, options))??;

        let navigated =
            tokio::time::timeout(options.timeout, self.navigate(&page, url, options)).await;
        match navigated {
            Ok(Ok(())) => Ok(Box::new(BrowserListing {
                page,
                timeout: options.timeout,
            })),
            Ok(Err(e)) => {
                let _ = page.close().await;
                Err(e)
            }
            Err(_) => {
                let _ = page.close().await;
                Err(Self::timeout_error(url, options))
            }
        }
    }

    async fn shutdown(&self) {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            debug!("Browser close failed: {}", e);
        }
    }
}

/// A listing tab kept open across scroll rounds.
#[cfg(feature = "browser")]
struct BrowserListing {
    page: Page,
    timeout: Duration,
}

#[cfg(feature = "browser")]
#[async_trait]
impl ListingSession for BrowserListing {
    async fn advance(&mut self, plan: &ScrollPlan) -> Result<(), RenderError> {
        let script = format!("window.scrollBy(0, {});", plan.step_px);
        for _ in 0..plan.steps {
            self.page
                .evaluate(script.clone())
                .await
                .map_err(browser_error)?;
            tokio::time::sleep(plan.pause).await;
        }
        tokio::time::sleep(plan.settle).await;
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<String, RenderError> {
        match tokio::time::timeout(self.timeout, self.page.content()).await {
            Ok(result) => result.map_err(browser_error),
            Err(_) => Err(RenderError::Timeout {
                url: "listing snapshot".to_string(),
                seconds: self.timeout.as_secs(),
            }),
        }
    }

    async fn close(self: Box<Self>) {
        let _ = self.page.close().await;
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct BrowserRenderer;

#[cfg(not(feature = "browser"))]
impl BrowserRenderer {
    pub async fn launch(_config: BrowserConfig) -> Result<Self, RenderError> {
        Err(RenderError::Unsupported(
            "Browser support not compiled. Rebuild with --features browser or use engine = \"http\"".to_string(),
        ))
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait::async_trait]
impl super::Renderer for BrowserRenderer {
    async fn render(
        &self,
        _url: &str,
        _options: &super::RenderOptions,
    ) -> Result<String, RenderError> {
        Err(RenderError::Unsupported("browser feature disabled".to_string()))
    }

    async fn open_listing(
        &self,
        _url: &str,
        _options: &super::RenderOptions,
    ) -> Result<Box<dyn super::ListingSession>, RenderError> {
        Err(RenderError::Unsupported("browser feature disabled".to_string()))
    }
}
