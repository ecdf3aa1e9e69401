//! Plain HTTP renderer.
//!
//! Returns server-rendered HTML without executing scripts. Listing sessions
//! cannot scroll, so every round sees the same snapshot and the frontier
//! stagnates after the first round.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::config::{BrowserConfig, RenderOptions, ScrollPlan};
use super::user_agent::resolve_user_agent;
use super::{ListingSession, RenderError, Renderer};

/// HTTP GET renderer.
#[derive(Clone)]
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    pub fn new(config: &BrowserConfig) -> Result<Self, RenderError> {
        let mut builder = Client::builder()
            .user_agent(resolve_user_agent(config.user_agent.as_deref()))
            .gzip(true)
            .brotli(true)
            .connect_timeout(Duration::from_secs(config.timeout));
        if let Some(ref proxy) = config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| RenderError::Browser(format!("Invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| RenderError::Browser(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str, options: &RenderOptions) -> Result<String, RenderError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| classify(url, options, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::Navigation {
                url: url.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        response.text().await.map_err(|e| classify(url, options, e))
    }
}

fn classify(url: &str, options: &RenderOptions, e: reqwest::Error) -> RenderError {
    if e.is_timeout() {
        RenderError::Timeout {
            url: url.to_string(),
            seconds: options.timeout.as_secs(),
        }
    } else {
        RenderError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn render(&self, url: &str, options: &RenderOptions) -> Result<String, RenderError> {
        self.get(url, options).await
    }

    async fn open_listing(
        &self,
        url: &str,
        options: &RenderOptions,
    ) -> Result<Box<dyn ListingSession>, RenderError> {
        let html = self.get(url, options).await?;
        Ok(Box::new(StaticListing { html }))
    }
}

/// Listing that never changes between rounds.
struct StaticListing {
    html: String,
}

#[async_trait]
impl ListingSession for StaticListing {
    async fn advance(&mut self, _plan: &ScrollPlan) -> Result<(), RenderError> {
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<String, RenderError> {
        Ok(self.html.clone())
    }

    async fn close(self: Box<Self>) {}
}
