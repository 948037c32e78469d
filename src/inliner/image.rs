//! Pass B: images get `data:` URI sources.

use super::dom::{self, Document};
use super::{record_rewrite, record_skip, InlineReport, InlinedPayload, Inliner, ResourceKind, ResourceReference};
use crate::fetch::{BodyKind, FetchOutcome};
use markup5ever_rcdom::Handle;
use url::Url;

/// Responsive and lazy-loading attributes that would override or defer a
/// fixed `src`.
const OVERRIDING_ATTRIBUTES: [&str; 4] = ["srcset", "sizes", "data-srcset", "loading"];

/// The `src` to resolve: the primary attribute, else the first non-blank
/// lazy-load attribute.
fn image_source(img: &Handle, lazy_attributes: &[String]) -> Option<String> {
    let non_blank = |value: String| if value.trim().is_empty() { None } else { Some(value) };
    dom::attr(img, "src").and_then(non_blank).or_else(|| {
        lazy_attributes
            .iter()
            .find_map(|name| dom::attr(img, name).and_then(non_blank))
    })
}

pub(super) fn inline_images(inliner: &Inliner, document: &mut Document, base: &Url, report: &mut InlineReport) {
    let lazy = &inliner.lazy_src_attributes;
    let targets: Vec<_> = document
        .elements("img")
        .into_iter()
        .filter_map(|img| {
            let src = image_source(&img, lazy)?;
            ResourceReference::resolve(ResourceKind::Image, &src, base).map(|r| (img, r))
        })
        .collect();

    let refs: Vec<ResourceReference> = targets.iter().map(|(_, r)| r.clone()).collect();
    let outcomes = inliner.fetch_in_order(&refs, BodyKind::Binary);

    for ((img, reference), outcome) in targets.iter().zip(outcomes) {
        match outcome {
            FetchOutcome::Fetched(resource) => {
                let data_uri = InlinedPayload::from_resource(resource).to_string();
                dom::set_attr(img, "src", &data_uri);
                for name in OVERRIDING_ATTRIBUTES.iter().copied().chain(lazy.iter().map(String::as_str)) {
                    dom::remove_attr(img, name);
                }
                record_rewrite(report, ResourceKind::Image);
                log::debug!("Inlined image {}", reference.resolved);
            }
            FetchOutcome::Skipped(reason) => record_skip(report, reference, &reason),
        }
    }
}
