//! Pass D: anchors point at the live web and open in a new context.

use super::dom::{self, Document};
use super::{record_rewrite, InlineReport, ResourceKind, ResourceReference};
use url::Url;

/// Fragment and `javascript:` references mean nothing once made absolute.
fn keeps_original(href: &str) -> bool {
    href.starts_with('#')
        || href
            .get(..11)
            .map(|scheme| scheme.eq_ignore_ascii_case("javascript:"))
            .unwrap_or(false)
}

pub(super) fn rewrite_anchors(document: &mut Document, base: &Url, report: &mut InlineReport) {
    for anchor in document.elements("a") {
        let Some(href) = dom::attr(&anchor, "href") else {
            continue;
        };
        if keeps_original(&href) {
            continue;
        }
        let Some(reference) = ResourceReference::resolve(ResourceKind::Anchor, &href, base) else {
            continue;
        };
        dom::set_attr(&anchor, "href", reference.resolved.as_str());
        dom::set_attr(&anchor, "target", "_blank");
        record_rewrite(report, ResourceKind::Anchor);
    }
}
