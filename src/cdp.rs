//! Chrome DevTools Protocol renderer (uses the `headless_chrome` crate)

use crate::{BundleConfig, CaptureRequest, Error, Renderer, Result};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Emulation;
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

const READY_STATE_POLL: Duration = Duration::from_millis(100);
const READY_STATE_EVAL_LIMIT: Duration = Duration::from_secs(2);
const SCROLL_TO_BOTTOM: &str =
    "window.scrollTo(0, Math.max(document.body ? document.body.scrollHeight : 0, document.documentElement.scrollHeight))";

/// Renders pages in headless Chrome.
///
/// Every `render` call launches its own browser with a fresh incognito
/// context and tears it down before returning, on success and on error
/// alike. Nothing is shared between calls.
pub struct CdpRenderer {
    config: BundleConfig,
}

impl CdpRenderer {
    pub fn new(config: BundleConfig) -> Self {
        Self { config }
    }
}

impl Renderer for CdpRenderer {
    fn render(&mut self, request: &CaptureRequest) -> Result<String> {
        let session = Session::launch(&self.config)?;
        let result = session.capture(request, &self.config);
        // Dropping the browser terminates the Chrome process.
        drop(session);
        info!("Browser session for {} closed", request.source_url);
        result
    }
}

struct Session {
    browser: Browser,
}

impl Session {
    fn launch(config: &BundleConfig) -> Result<Self> {
        // Keep the connection alive for the whole capture: navigation bound
        // plus both grace waits, with headroom.
        let idle = Duration::from_millis(
            config.navigation_timeout_ms + config.settle_delay_ms + config.scroll_delay_ms + 30_000,
        );
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((config.viewport.width, config.viewport.height)))
            .idle_browser_timeout(idle)
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;

        Ok(Self { browser })
    }

    fn capture(&self, request: &CaptureRequest, config: &BundleConfig) -> Result<String> {
        let context = self
            .browser
            .new_context()
            .map_err(|e| Error::InitializationError(format!("Failed to create browser context: {}", e)))?;
        let tab = context
            .new_tab()
            .map_err(|e| Error::InitializationError(format!("Failed to create tab: {}", e)))?;

        configure_tab(&tab, request, config)?;

        info!("Navigating to {}", request.source_url);
        let navigation_error = match tab.navigate_to(request.source_url.as_str()) {
            Ok(_) => None,
            Err(e) => {
                warn!("Navigation to {} reported an error: {}", request.source_url, e);
                Some(e.to_string())
            }
        };

        wait_for_dom_content(&tab, Duration::from_millis(config.navigation_timeout_ms));

        std::thread::sleep(Duration::from_millis(config.settle_delay_ms));
        if let Err(e) = tab.evaluate(SCROLL_TO_BOTTOM, false) {
            warn!("Scroll to bottom failed: {}", e);
        }
        std::thread::sleep(Duration::from_millis(config.scroll_delay_ms));

        let landed = tab.get_url();
        if landed.starts_with("chrome-error://") {
            let cause = navigation_error.unwrap_or(landed);
            return Err(Error::EmptyContent(format!("{}: {}", request.source_url, cause)));
        }

        tab.get_content().map_err(|e| {
            Error::EmptyContent(format!("{}: failed to read document: {}", request.source_url, e))
        })
    }
}

fn configure_tab(tab: &Arc<Tab>, request: &CaptureRequest, config: &BundleConfig) -> Result<()> {
    let accept_language = request.accept_language();

    tab.set_default_timeout(Duration::from_millis(config.navigation_timeout_ms));

    tab.set_user_agent(&request.user_agent, Some(&accept_language), None)?;

    let mut headers = HashMap::new();
    headers.insert("Accept-Language", accept_language.as_str());
    tab.set_extra_http_headers(headers)?;

    // Emulation overrides only shape what the site sees; failing them is not fatal.
    if let Err(e) = tab.call_method(Emulation::SetTimezoneOverride {
        timezone_id: request.timezone_id.to_string(),
    }) {
        warn!("Failed to override timezone to {}: {}", request.timezone_id, e);
    }
    if let Err(e) = tab.call_method(Emulation::SetLocaleOverride {
        locale: Some(request.locale.code().to_string()),
    }) {
        warn!("Failed to override locale to {}: {}", request.locale, e);
    }

    Ok(())
}

/// Poll `document.readyState` until the DOM has been parsed or `limit`
/// elapses. Timing out is not an error: capture continues with whatever is
/// present.
fn wait_for_dom_content(tab: &Arc<Tab>, limit: Duration) {
    let deadline = Instant::now() + limit;
    loop {
        // Each evaluate is bounded by the time left, so a stalled call
        // cannot outlive the overall limit.
        tab.set_default_timeout(eval_timeout(deadline, Instant::now()));
        let state = tab
            .evaluate("document.readyState", false)
            .ok()
            .and_then(|r| r.value)
            .and_then(|v| v.as_str().map(|s| s.to_string()));

        match state.as_deref() {
            Some("interactive") | Some("complete") => {
                debug!("DOM content loaded ({})", state.unwrap_or_default());
                break;
            }
            _ if Instant::now() >= deadline => {
                warn!(
                    "Page did not reach DOMContentLoaded within {}ms; continuing with current content",
                    limit.as_millis()
                );
                break;
            }
            _ => std::thread::sleep(READY_STATE_POLL),
        }
    }
    tab.set_default_timeout(limit);
}

fn eval_timeout(deadline: Instant, now: Instant) -> Duration {
    deadline
        .saturating_duration_since(now)
        .clamp(READY_STATE_POLL, READY_STATE_EVAL_LIMIT)
}
