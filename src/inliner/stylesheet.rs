//! Pass A: `<link rel="stylesheet">` becomes an inline `<style>`.

use super::dom::{self, Document};
use super::{escape_end_tag, record_rewrite, record_skip, InlineReport, InlinedPayload, Inliner, ResourceKind, ResourceReference};
use crate::fetch::{BodyKind, FetchOutcome};
use url::Url;

/// `rel` is a token list; `stylesheet` may appear next to e.g. `alternate`.
fn is_stylesheet_link(rel: &str) -> bool {
    rel.split_ascii_whitespace()
        .any(|token| token.eq_ignore_ascii_case("stylesheet"))
}

pub(super) fn inline_stylesheets(inliner: &Inliner, document: &mut Document, base: &Url, report: &mut InlineReport) {
    let targets: Vec<_> = document
        .elements("link")
        .into_iter()
        .filter(|link| dom::attr(link, "rel").map(|rel| is_stylesheet_link(&rel)).unwrap_or(false))
        .filter_map(|link| {
            let href = dom::attr(&link, "href")?;
            ResourceReference::resolve(ResourceKind::Stylesheet, &href, base).map(|r| (link, r))
        })
        .collect();

    let refs: Vec<ResourceReference> = targets.iter().map(|(_, r)| r.clone()).collect();
    let outcomes = inliner.fetch_in_order(&refs, BodyKind::Text);

    for ((link, reference), outcome) in targets.iter().zip(outcomes) {
        match outcome {
            FetchOutcome::Fetched(resource) => {
                let css = escape_end_tag(&InlinedPayload::from_resource(resource).to_string(), "style");
                let mut attrs = Vec::new();
                if let Some(media) = dom::attr(link, "media") {
                    attrs.push(("media", media));
                }
                document.replace_with_element(link, "style", attrs, &css);
                record_rewrite(report, ResourceKind::Stylesheet);
                log::debug!("Inlined stylesheet {}", reference.resolved);
            }
            FetchOutcome::Skipped(reason) => record_skip(report, reference, &reason),
        }
    }
}
