//! pagepack
//!
//! Captures a live, possibly script-rendered web page and packs it into a
//! single self-contained HTML document: stylesheets, images and scripts are
//! fetched and embedded, and links are rewritten to absolute URLs that open
//! in a new browsing context.
//!
//! # Pipeline
//!
//! - **Capture**: a [`Renderer`] produces the rendered DOM of the page. The
//!   default backend drives headless Chrome over CDP (feature `cdp`).
//! - **Inline**: the [`inliner::Inliner`] rewrites the DOM in four
//!   best-effort passes and serializes the result into a [`Bundle`].
//!
//! Individual resource failures never fail a conversion; only launch
//! failures and pages with no retrievable content do.
//!
//! # Example
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bundle = pagepack::bundle("https://example.com", "en-US")?;
//! bundle.save("example.html")?;
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

pub mod error;
pub use error::{Error, Result};

pub mod fetch;
pub mod inliner;
pub mod locale;

pub use inliner::{InlineReport, Inliner};
pub use locale::{CaptureRequest, Locale};

#[cfg(feature = "cdp")]
pub mod cdp;

// HTTP-only renderer (no JS); used without Chrome and as the cdp-less default
pub mod simple;

// Async-friendly facade backed by a worker thread
pub mod async_api;

/// MIME type of a persisted bundle
pub const BUNDLE_MIME_TYPE: &str = "text/html";

/// Desktop Chrome user agent sent by both the browser session and the fetch layer
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Configuration shared by capture and inlining.
///
/// Defaults follow the conversion policy: 60 s navigation bound, 3 s settle
/// wait, 2 s post-scroll wait and a 10 s bound per resource fetch. Every
/// field has a default, so a partial JSON document deserializes into a full
/// configuration.
///
/// # Examples
///
/// ```
/// let cfg = pagepack::BundleConfig::default();
/// assert_eq!(cfg.fetch_timeout_ms, 10_000);
/// assert_eq!(cfg.lazy_src_attributes, vec!["data-src".to_string()]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    /// User agent string for the browser and for resource fetches
    pub user_agent: String,
    /// Content locale requested from the site
    pub locale: Locale,
    /// Browser window size
    pub viewport: Viewport,
    /// Upper bound on waiting for DOM-content-loaded, in milliseconds
    pub navigation_timeout_ms: u64,
    /// Grace period after navigation for post-load rendering
    pub settle_delay_ms: u64,
    /// Grace period after scrolling to the bottom, for lazy content
    pub scroll_delay_ms: u64,
    /// Timeout of each resource fetch
    pub fetch_timeout_ms: u64,
    /// Maximum number of in-flight resource fetches within one pass
    pub fetch_concurrency: usize,
    /// Attributes consulted, in order, when an `<img>` has no usable `src`
    pub lazy_src_attributes: Vec<String>,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            locale: Locale::default(),
            viewport: Viewport::default(),
            navigation_timeout_ms: 60_000,
            settle_delay_ms: 3_000,
            scroll_delay_ms: 2_000,
            fetch_timeout_ms: 10_000,
            fetch_concurrency: num_cpus::get().max(1),
            lazy_src_attributes: vec!["data-src".to_string()],
        }
    }
}

impl BundleConfig {
    /// Default configuration for a given locale code such as `"ko-KR"`.
    pub fn for_locale(locale_code: &str) -> Result<Self> {
        Ok(Self {
            locale: locale_code.parse()?,
            ..Default::default()
        })
    }

    /// Build the capture request for `source_url` under this configuration.
    pub fn capture_request(&self, source_url: &str) -> Result<CaptureRequest> {
        CaptureRequest::new(source_url, self.locale, self.user_agent.clone())
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// A DOM snapshot of a page as rendered for one capture request.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub html: String,
    pub source_url: Url,
}

/// The final single-file document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    html: String,
    source_url: Url,
}

impl Bundle {
    pub fn new(html: String, source_url: Url) -> Self {
        Self { html, source_url }
    }

    pub fn as_str(&self) -> &str {
        &self.html
    }

    pub fn into_string(self) -> String {
        self.html
    }

    pub fn source_url(&self) -> &Url {
        &self.source_url
    }

    /// Write the bundle as UTF-8 text. The extension is forced to `.html`;
    /// returns the path actually written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let mut path = path.as_ref().to_path_buf();
        let is_html = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("html"))
            .unwrap_or(false);
        if !is_html {
            path.set_extension("html");
        }
        std::fs::write(&path, self.html.as_bytes())?;
        Ok(path)
    }
}

impl fmt::Display for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.html)
    }
}

/// Produces the rendered DOM of a page.
///
/// This is the seam between the pipeline and whatever rendering engine backs
/// it: the CDP backend launches one isolated browser session per call, the
/// simple backend performs a plain HTTP GET, and tests can supply fixed HTML.
pub trait Renderer {
    /// Render `request.source_url` and return its serialized DOM
    fn render(&mut self, request: &CaptureRequest) -> Result<String>;
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&mut self, request: &CaptureRequest) -> Result<String> {
        (**self).render(request)
    }
}

/// Create the default renderer for `config`.
///
/// This is the CDP backend when the `cdp` feature is enabled (default),
/// otherwise the HTTP-only [`simple::SimpleRenderer`].
#[cfg(feature = "cdp")]
pub fn new_renderer(config: &BundleConfig) -> Result<impl Renderer> {
    Ok(cdp::CdpRenderer::new(config.clone()))
}

#[cfg(not(feature = "cdp"))]
pub fn new_renderer(config: &BundleConfig) -> Result<impl Renderer> {
    simple::SimpleRenderer::new(config)
}

/// Capture `source_url` with the default renderer and default configuration
/// for `locale_code`.
pub fn capture(source_url: &str, locale_code: &str) -> Result<RenderedDocument> {
    let config = BundleConfig::for_locale(locale_code)?;
    let request = config.capture_request(source_url)?;
    let mut renderer = new_renderer(&config)?;
    capture_with(&mut renderer, &request)
}

/// Capture through a caller-supplied renderer.
///
/// Fails with [`Error::EmptyContent`] when the renderer returned nothing
/// usable.
pub fn capture_with<R: Renderer + ?Sized>(
    renderer: &mut R,
    request: &CaptureRequest,
) -> Result<RenderedDocument> {
    log::info!(
        "Capturing {} (locale {}, timezone {})",
        request.source_url,
        request.locale,
        request.timezone_id
    );
    let html = renderer.render(request)?;
    if !has_content(&html) {
        return Err(Error::EmptyContent(format!(
            "no content could be extracted from {}",
            request.source_url
        )));
    }
    Ok(RenderedDocument {
        html,
        source_url: request.source_url.clone(),
    })
}

/// Inline the resources of `rendered_html` using default configuration.
///
/// Resource failures are absorbed; an error means the base URL is malformed
/// or the fetch layer could not be built.
///
/// # Panics
///
/// Drives its own runtime, so it panics when called from within a tokio
/// runtime. Use [`async_api::Converter::inline`] there.
pub fn inline(rendered_html: &str, source_url: &str) -> Result<Bundle> {
    let base = Url::parse(source_url)?;
    let inliner = Inliner::new(&BundleConfig::default())?;
    Ok(inliner.inline(rendered_html, &base))
}

/// Capture and inline in sequence with the default renderer.
pub fn bundle(source_url: &str, locale_code: &str) -> Result<Bundle> {
    let config = BundleConfig::for_locale(locale_code)?;
    let mut renderer = new_renderer(&config)?;
    bundle_with(&mut renderer, source_url, &config)
}

/// Capture and inline in sequence with a caller-supplied renderer.
///
/// The renderer has fully returned (and, for CDP, torn its session down)
/// before any resource is fetched.
pub fn bundle_with<R: Renderer + ?Sized>(
    renderer: &mut R,
    source_url: &str,
    config: &BundleConfig,
) -> Result<Bundle> {
    let request = config.capture_request(source_url)?;
    let document = capture_with(renderer, &request)?;
    let inliner = Inliner::new(config)?;
    Ok(inliner.inline(&document.html, &document.source_url))
}

// A document has content when its tree holds any element beyond the implied
// html/head/body skeleton, or any non-blank text.
fn has_content(html: &str) -> bool {
    if html.trim().is_empty() {
        return false;
    }
    let document = scraper::Html::parse_document(html);
    document.root_element().descendants().any(|node| match node.value() {
        scraper::Node::Text(text) => !text.trim().is_empty(),
        scraper::Node::Element(element) => !matches!(element.name(), "html" | "head" | "body"),
        _ => false,
    })
}
