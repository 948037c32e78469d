//! Pass C: external scripts get their source embedded.

use super::dom::{self, Document};
use super::{escape_end_tag, record_rewrite, record_skip, InlineReport, InlinedPayload, Inliner, ResourceKind, ResourceReference};
use crate::fetch::{BodyKind, FetchOutcome};
use url::Url;

pub(super) fn inline_scripts(inliner: &Inliner, document: &mut Document, base: &Url, report: &mut InlineReport) {
    let targets: Vec<_> = document
        .elements("script")
        .into_iter()
        .filter_map(|script| {
            let src = dom::attr(&script, "src")?;
            ResourceReference::resolve(ResourceKind::Script, &src, base).map(|r| (script, r))
        })
        .collect();

    let refs: Vec<ResourceReference> = targets.iter().map(|(_, r)| r.clone()).collect();
    let outcomes = inliner.fetch_in_order(&refs, BodyKind::Text);

    // No ordering analysis: each script is embedded where it stood.
    for ((script, reference), outcome) in targets.iter().zip(outcomes) {
        match outcome {
            FetchOutcome::Fetched(resource) => {
                let source = escape_end_tag(&InlinedPayload::from_resource(resource).to_string(), "script");
                document.set_text(script, &source);
                dom::remove_attr(script, "src");
                record_rewrite(report, ResourceKind::Script);
                log::debug!("Inlined script {}", reference.resolved);
            }
            FetchOutcome::Skipped(reason) => record_skip(report, reference, &reason),
        }
    }
}
