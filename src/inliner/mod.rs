//! Resource inliner: turns a rendered DOM into a self-contained document.
//!
//! Four passes run in a fixed order, each over a snapshot of its own node
//! set:
//!
//! 1. stylesheet links become `<style>` elements
//! 2. images get `data:` URI sources
//! 3. external scripts get their source embedded
//! 4. anchors are resolved to absolute URLs opening in a new context
//!
//! The first three fetch over the network. Fetches within a pass run
//! concurrently, but their results are applied in document order, so the
//! same inputs always serialize to the same bytes. A failed fetch leaves its
//! node as it was.

use crate::fetch::{Body, BodyKind, FetchOutcome, FetchedResource, Fetcher, SkipReason};
use crate::{Bundle, BundleConfig, Error, Result};
use base64::Engine as Base64Engine;
use std::fmt;
use std::time::Duration;
use url::Url;

pub mod dom;

mod anchor;
mod image;
mod script;
mod stylesheet;

use dom::Document;

/// Category of a reference found in the DOM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Stylesheet,
    Image,
    Script,
    Anchor,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Stylesheet => "stylesheet",
            ResourceKind::Image => "image",
            ResourceKind::Script => "script",
            ResourceKind::Anchor => "anchor",
        };
        f.write_str(name)
    }
}

/// A DOM reference resolved against the page URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReference {
    pub kind: ResourceKind,
    pub raw: String,
    pub resolved: Url,
}

impl ResourceReference {
    /// Resolve `raw` against `base`. Blank or unresolvable values yield `None`.
    pub fn resolve(kind: ResourceKind, raw: &str, base: &Url) -> Option<Self> {
        if raw.trim().is_empty() {
            return None;
        }
        match base.join(raw) {
            Ok(resolved) => Some(Self {
                kind,
                raw: raw.to_string(),
                resolved,
            }),
            Err(e) => {
                log::debug!("Cannot resolve {} reference '{}': {}", kind, raw, e);
                None
            }
        }
    }
}

/// Content ready to be spliced into a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlinedPayload {
    DataUri { mime_type: String, encoded_data: String },
    Text(String),
}

impl InlinedPayload {
    /// Text payloads are embedded verbatim; binary payloads become base64 data.
    pub fn from_resource(resource: FetchedResource) -> Self {
        let mime_type = resource.mime_type();
        match resource.body {
            Body::Text(text) => InlinedPayload::Text(text),
            Body::Binary(bytes) => InlinedPayload::DataUri {
                mime_type,
                encoded_data: base64::engine::general_purpose::STANDARD.encode(bytes),
            },
        }
    }
}

impl fmt::Display for InlinedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InlinedPayload::DataUri {
                mime_type,
                encoded_data,
            } => write!(f, "data:{};base64,{}", mime_type, encoded_data),
            InlinedPayload::Text(text) => f.write_str(text),
        }
    }
}

/// Rewrite counts for one pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassStats {
    pub rewritten: usize,
    pub skipped: usize,
}

/// What happened during one `inline` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InlineReport {
    pub stylesheets: PassStats,
    pub images: PassStats,
    pub scripts: PassStats,
    pub anchors: PassStats,
}

impl InlineReport {
    pub fn stats(&self, kind: ResourceKind) -> PassStats {
        match kind {
            ResourceKind::Stylesheet => self.stylesheets,
            ResourceKind::Image => self.images,
            ResourceKind::Script => self.scripts,
            ResourceKind::Anchor => self.anchors,
        }
    }

    fn stats_mut(&mut self, kind: ResourceKind) -> &mut PassStats {
        match kind {
            ResourceKind::Stylesheet => &mut self.stylesheets,
            ResourceKind::Image => &mut self.images,
            ResourceKind::Script => &mut self.scripts,
            ResourceKind::Anchor => &mut self.anchors,
        }
    }

    pub fn total_skipped(&self) -> usize {
        self.stylesheets.skipped + self.images.skipped + self.scripts.skipped + self.anchors.skipped
    }
}

impl fmt::Display for InlineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stylesheets {}/{}, images {}/{}, scripts {}/{}, anchors {}",
            self.stylesheets.rewritten,
            self.stylesheets.rewritten + self.stylesheets.skipped,
            self.images.rewritten,
            self.images.rewritten + self.images.skipped,
            self.scripts.rewritten,
            self.scripts.rewritten + self.scripts.skipped,
            self.anchors.rewritten,
        )
    }
}

/// Inlines the resources of rendered documents.
///
/// Owns the HTTP session and a single-threaded runtime that drives it, so
/// [`Inliner::inline`] is a blocking call. Do not call it from inside an
/// async context; use [`crate::async_api::Converter`] there.
pub struct Inliner {
    fetcher: Fetcher,
    runtime: tokio::runtime::Runtime,
    concurrency: usize,
    lazy_src_attributes: Vec<String>,
}

impl Inliner {
    pub fn new(config: &BundleConfig) -> Result<Self> {
        let fetcher = Fetcher::new(
            &config.user_agent,
            &config.locale.accept_language(),
            Duration::from_millis(config.fetch_timeout_ms),
        )?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to start fetch runtime: {}", e)))?;

        Ok(Self {
            fetcher,
            runtime,
            concurrency: config.fetch_concurrency.max(1),
            lazy_src_attributes: config.lazy_src_attributes.clone(),
        })
    }

    /// Inline every resource of `html`, resolving references against
    /// `source_url`. Never fails: unresolved references stay as they were.
    pub fn inline(&self, html: &str, source_url: &Url) -> Bundle {
        self.inline_with_report(html, source_url).0
    }

    /// Like [`Inliner::inline`], also returning per-pass counts.
    pub fn inline_with_report(&self, html: &str, source_url: &Url) -> (Bundle, InlineReport) {
        let mut document = Document::parse(html);
        let mut report = InlineReport::default();

        stylesheet::inline_stylesheets(self, &mut document, source_url, &mut report);
        image::inline_images(self, &mut document, source_url, &mut report);
        script::inline_scripts(self, &mut document, source_url, &mut report);
        anchor::rewrite_anchors(&mut document, source_url, &mut report);

        log::info!("Inlined {}: {}", source_url, report);
        (Bundle::new(document.serialize(), source_url.clone()), report)
    }

    /// Fetch every reference, returning outcomes in the order given.
    fn fetch_in_order(&self, refs: &[ResourceReference], kind: BodyKind) -> Vec<FetchOutcome> {
        if refs.is_empty() {
            return Vec::new();
        }
        let urls: Vec<Url> = refs.iter().map(|r| r.resolved.clone()).collect();
        self.runtime
            .block_on(self.fetcher.fetch_all(&urls, kind, self.concurrency))
    }
}

// Records and logs a skipped reference; the node itself is left alone.
fn record_skip(report: &mut InlineReport, reference: &ResourceReference, reason: &SkipReason) {
    report.stats_mut(reference.kind).skipped += 1;
    match reason {
        SkipReason::UnsupportedScheme(_) => {
            log::debug!("Leaving {} {} as is: {}", reference.kind, reference.raw, reason)
        }
        _ => log::warn!(
            "Failed to inline {} {}: {}",
            reference.kind,
            reference.resolved,
            reason
        ),
    }
}

fn record_rewrite(report: &mut InlineReport, kind: ResourceKind) {
    report.stats_mut(kind).rewritten += 1;
}

/// Rewrite every `</tag` (ASCII case-insensitive) in raw element text as
/// `<\/tag`, so embedded text cannot close its `<script>` or `<style>`.
pub(crate) fn escape_end_tag(text: &str, tag: &str) -> String {
    let needle = format!("</{}", tag.to_ascii_lowercase());
    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let lowered = text.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (at, _) in lowered.match_indices(&needle) {
        out.push_str(&text[last..at]);
        out.push_str("<\\/");
        last = at + 2;
    }
    out.push_str(&text[last..]);
    out
}
