//! Page rendering capability.
//!
//! A [`Renderer`] turns a URL into an HTML snapshot. Listing pages are
//! driven through a [`ListingSession`] that can be scrolled between
//! snapshots. One renderer is one exclusive browser session; callers own
//! it explicitly and pass it to whatever needs it.

mod browser;
pub mod config;
mod http;
pub mod user_agent;

pub use browser::BrowserRenderer;
pub use config::{BrowserConfig, RenderEngine, RenderOptions, ScrollPlan};
pub use http::HttpRenderer;
pub use user_agent::{random_index, resolve_user_agent};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Render failures. All of them are transient from the pipeline's view.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render of {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("browser error: {0}")]
    Browser(String),

    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Renders URLs to HTML.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render one page and return its HTML once ready.
    async fn render(&self, url: &str, options: &RenderOptions) -> Result<String, RenderError>;

    /// Open a listing page for incremental scrolling.
    async fn open_listing(
        &self,
        url: &str,
        options: &RenderOptions,
    ) -> Result<Box<dyn ListingSession>, RenderError>;

    /// Release the underlying session.
    async fn shutdown(&self) {}
}

/// An open listing page.
#[async_trait]
pub trait ListingSession: Send {
    /// Scroll according to the plan and wait for it to settle.
    async fn advance(&mut self, plan: &ScrollPlan) -> Result<(), RenderError>;

    /// Current HTML of the page.
    async fn snapshot(&mut self) -> Result<String, RenderError>;

    async fn close(self: Box<Self>);
}

/// Build the configured renderer.
pub async fn create_renderer(config: &BrowserConfig) -> Result<Arc<dyn Renderer>, RenderError> {
    match config.engine {
        RenderEngine::Browser => {
            let renderer = BrowserRenderer::launch(config.clone()).await?;
            Ok(Arc::new(renderer))
        }
        RenderEngine::Http => Ok(Arc::new(HttpRenderer::new(config)?)),
    }
}
