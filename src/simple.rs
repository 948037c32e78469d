//! A lightweight, browser-less renderer.
//!
//! Performs a single HTTP GET with the capture's user agent and
//! `Accept-Language` and returns the served HTML unchanged. Scripts are not
//! executed, so pages that build their DOM client-side come back as their
//! server-rendered shell. Useful where Chrome is not installed.

use crate::{BundleConfig, CaptureRequest, Error, Renderer, Result};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT_LANGUAGE, USER_AGENT};
use std::time::Duration;

pub struct SimpleRenderer {
    client: Client,
}

impl SimpleRenderer {
    pub fn new(config: &BundleConfig) -> Result<Self> {
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_millis(config.navigation_timeout_ms))
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl Renderer for SimpleRenderer {
    fn render(&mut self, request: &CaptureRequest) -> Result<String> {
        let res = self
            .client
            .get(request.source_url.clone())
            .header(USER_AGENT, request.user_agent.as_str())
            .header(ACCEPT_LANGUAGE, request.accept_language())
            .send()
            .map_err(|e| Error::LoadError(format!("HTTP GET {} failed: {}", request.source_url, e)))?;

        // Error pages still have content worth keeping, as in a browser.
        if !res.status().is_success() {
            log::warn!("{} answered with status {}", request.source_url, res.status());
        }

        res.text()
            .map_err(|e| Error::LoadError(format!("Failed to read response body: {}", e)))
    }
}
