//! Integration tests for the resource inliner against a local server

use pagepack::{BundleConfig, Inliner};
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use tiny_http::{Header, Response, Server};
use url::Url;

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake";

/// Serves a handful of fixed resources on an ephemeral port; everything else
/// is a 404.
fn start_resource_server() -> String {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr();

    std::thread::spawn(move || {
        for request in server.incoming_requests() {
            let path = request.url().to_string();
            let (body, content_type): (Vec<u8>, &str) = match path.as_str() {
                "/style.css" => (b"body{color:red}".to_vec(), "text/css; charset=utf-8"),
                "/print.css" => (b"@page{margin:0}".to_vec(), "text/css"),
                "/app.js" => (b"window.loaded = 1 < 2;".to_vec(), "application/javascript"),
                "/nested.js" => (
                    b"var s = '<script>x()</script>'; window.ok = 1;".to_vec(),
                    "application/javascript",
                ),
                "/nested.css" => (b"a::after{content:'</style>'}".to_vec(), "text/css"),
                "/img/logo.png" => (PNG_BYTES.to_vec(), "image/png"),
                "/lazy.png" => (PNG_BYTES.to_vec(), "image/png; foo=bar"),
                _ => {
                    let _ = request.respond(Response::from_string("Not Found").with_status_code(404));
                    continue;
                }
            };
            let header = format!("Content-Type: {}", content_type)
                .parse::<Header>()
                .unwrap();
            let _ = request.respond(Response::from_data(body).with_header(header));
        }
    });

    format!("http://{}/", addr)
}

fn inliner() -> Inliner {
    let config = BundleConfig {
        fetch_timeout_ms: 5_000,
        fetch_concurrency: 4,
        ..Default::default()
    };
    Inliner::new(&config).expect("failed to build inliner")
}

fn count(html: &str, selector: &str) -> usize {
    let document = Html::parse_document(html);
    let selector = Selector::parse(selector).unwrap();
    document.select(&selector).count()
}

fn first_attr(html: &str, selector: &str, attr: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(selector).unwrap();
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr(attr).map(|s| s.to_string()))
}

#[test]
fn scenario_page_is_bundled() {
    let base = start_resource_server();
    let html = r##"<!DOCTYPE html>
<html>
<head>
<link rel="stylesheet" href="/style.css">
<script src="/app.js"></script>
</head>
<body>
<img src="/img/missing.png" alt="gone">
<a href="#top">Top</a>
<a href="/contact">Contact</a>
</body>
</html>"##;

    let (bundle, report) = inliner().inline_with_report(html, &Url::parse(&base).unwrap());
    let out = bundle.as_str();

    // stylesheet embedded
    assert_eq!(count(out, "style"), 1);
    assert_eq!(count(out, "link"), 0);
    assert!(out.contains("<style>body{color:red}</style>"));

    // unreachable image untouched
    assert!(out.contains(r#"<img src="/img/missing.png" alt="gone">"#));

    // script embedded without src
    assert_eq!(count(out, "script[src]"), 0);
    assert!(out.contains("<script>window.loaded = 1 < 2;</script>"));

    // anchors
    assert!(out.contains(r##"<a href="#top">Top</a>"##));
    let contact = format!(r#"<a href="{}contact" target="_blank">Contact</a>"#, base);
    assert!(out.contains(&contact), "missing rewritten anchor in {}", out);

    assert_eq!(report.stylesheets.rewritten, 1);
    assert_eq!(report.images.skipped, 1);
    assert_eq!(report.scripts.rewritten, 1);
    assert_eq!(report.anchors.rewritten, 1);
}

#[test]
fn only_reachable_stylesheets_are_inlined() {
    let base = start_resource_server();
    let html = r#"<html><head>
<link rel="stylesheet" href="style.css">
<link rel="stylesheet" href="gone-1.css">
<link rel="stylesheet" href="print.css" media="print">
<link rel="stylesheet" href="gone-2.css">
<link rel="stylesheet" href="gone-3.css">
<link rel="icon" href="favicon.ico">
</head><body></body></html>"#;

    let (bundle, report) = inliner().inline_with_report(html, &Url::parse(&base).unwrap());
    let out = bundle.as_str();

    // N = 5 stylesheet links, M = 2 reachable
    assert_eq!(count(out, "style"), 2);
    assert_eq!(count(out, "link[rel=stylesheet]"), 3);
    assert_eq!(count(out, "link[rel=icon]"), 1);
    assert!(out.contains(r#"<style media="print">@page{margin:0}</style>"#));
    assert!(out.contains(r#"<link rel="stylesheet" href="gone-1.css">"#));
    assert_eq!(report.stylesheets.rewritten, 2);
    assert_eq!(report.stylesheets.skipped, 3);
}

#[test]
fn images_become_data_uris() {
    let base = start_resource_server();
    let html = r#"<html><body>
<img src="img/logo.png" srcset="img/logo@2x.png 2x" sizes="100vw" loading="lazy">
<img data-src="lazy.png" class="lazy">
<img src="data:image/gif;base64,R0lGODlh">
</body></html>"#;

    let (bundle, report) = inliner().inline_with_report(html, &Url::parse(&base).unwrap());
    let out = bundle.as_str();

    let expected = "data:image/png;base64,iVBORw0KGgpmYWtl";
    assert_eq!(first_attr(out, "img.lazy", "src").as_deref(), Some(expected));
    assert_eq!(first_attr(out, "img.lazy", "data-src"), None);

    let document = Html::parse_document(out);
    let selector = Selector::parse("img").unwrap();
    let first = document.select(&selector).next().unwrap();
    assert_eq!(first.value().attr("src"), Some(expected));
    assert_eq!(first.value().attr("srcset"), None);
    assert_eq!(first.value().attr("sizes"), None);
    assert_eq!(first.value().attr("loading"), None);

    // already-embedded data stays as it was
    assert!(out.contains(r#"<img src="data:image/gif;base64,R0lGODlh">"#));
    assert_eq!(report.images.rewritten, 2);
}

#[test]
fn lazy_attribute_list_is_configurable() {
    let base = start_resource_server();
    let html = r#"<html><body><img data-lazy-src="lazy.png"></body></html>"#;
    let base = Url::parse(&base).unwrap();

    let untouched = inliner().inline(html, &base);
    assert!(untouched.as_str().contains(r#"<img data-lazy-src="lazy.png">"#));

    let config = BundleConfig {
        lazy_src_attributes: vec!["data-lazy-src".into(), "data-src".into()],
        ..Default::default()
    };
    let inlined = Inliner::new(&config).unwrap().inline(html, &base);
    assert!(inlined
        .as_str()
        .contains(r#"<img src="data:image/png;base64,iVBORw0KGgpmYWtl">"#));
}

#[test]
fn output_reparses_to_the_same_document() {
    let base = start_resource_server();
    let html = r#"<!DOCTYPE html><html><head><link rel="stylesheet" href="style.css"></head>
<body><p>Hello<img src="img/logo.png"><a href="x/y">y</a></p><script src="app.js"></script></body></html>"#;

    let bundle = inliner().inline(html, &Url::parse(&base).unwrap());
    let again = pagepack::inliner::dom::Document::parse(bundle.as_str()).serialize();
    assert_eq!(bundle.as_str(), again);
}

#[test]
fn embedded_end_tags_do_not_break_out() {
    let base = start_resource_server();
    let html = r#"<!DOCTYPE html><html><head><link rel="stylesheet" href="nested.css"><script src="nested.js"></script></head><body><p>x</p></body></html>"#;

    let (bundle, report) = inliner().inline_with_report(html, &Url::parse(&base).unwrap());
    let out = bundle.as_str();
    assert_eq!(report.scripts.rewritten, 1);
    assert_eq!(report.stylesheets.rewritten, 1);
    assert!(out.contains(r#"<script>var s = '<script>x()<\/script>'; window.ok = 1;</script>"#));
    assert!(out.contains(r#"<style>a::after{content:'<\/style>'}</style>"#));
    assert!(out.contains("<body><p>x</p></body>"));

    let again = pagepack::inliner::dom::Document::parse(out).serialize();
    assert_eq!(out, again);
    assert_eq!(count(&again, "script"), 1);
    assert_eq!(count(&again, "body > p"), 1);
}

#[test]
fn identical_inputs_give_identical_bytes() {
    let base = start_resource_server();
    let mut links = String::new();
    for i in 0..12 {
        links.push_str(&format!(r#"<link rel="stylesheet" href="{}">"#, if i % 3 == 0 { "style.css" } else { "print.css" }));
        links.push_str(&format!(r#"<img src="{}">"#, if i % 2 == 0 { "img/logo.png" } else { "missing.png" }));
    }
    let html = format!("<html><head></head><body>{}</body></html>", links);
    let base = Url::parse(&base).unwrap();

    let digest = |s: &str| hex::encode(Sha256::digest(s.as_bytes()));
    let first = digest(inliner().inline(&html, &base).as_str());
    let second = digest(inliner().inline(&html, &base).as_str());
    assert_eq!(first, second);
}

#[test]
fn unreachable_server_never_fails_the_bundle() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let base = format!("http://127.0.0.1:{}/", port);
    let html = r#"<html><head><link rel="stylesheet" href="a.css"><script src="a.js"></script></head><body><img src="a.png"></body></html>"#;

    let bundle = pagepack::inline(html, &base).expect("inline never fails on resources");
    assert!(bundle.as_str().contains(r#"<link rel="stylesheet" href="a.css">"#));
    assert!(bundle.as_str().contains(r#"<script src="a.js"></script>"#));
    assert!(bundle.as_str().contains(r#"<img src="a.png">"#));
}

#[test]
fn anchors_resolve_against_page_directory() {
    let html = r##"<a href="#section">s</a><a href="javascript:void(0)">j</a><a href="/about">a</a>"##;
    let bundle = pagepack::inline(html, "https://example.com/x/").unwrap();
    let out = bundle.as_str();
    assert!(out.contains(r##"<a href="#section">s</a>"##));
    assert!(out.contains(r#"<a href="javascript:void(0)">j</a>"#));
    assert!(out.contains(r#"<a href="https://example.com/about" target="_blank">a</a>"#));
}
