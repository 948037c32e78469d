//! Thin mutable DOM layer over `markup5ever_rcdom`.
//!
//! Structural edits go through html5ever's `TreeSink` implementation on
//! `RcDom`, so parent/child links stay consistent; attribute edits go through
//! the element's attribute cell.

use html5ever::serialize::{serialize, SerializeOpts};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::{ElementFlags, NodeOrText, TreeSink};
use html5ever::{parse_document, Attribute, LocalName, Namespace, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// A parsed, mutable HTML document.
pub struct Document {
    dom: RcDom,
}

impl Document {
    /// Parse a full HTML document. Parsing never fails; malformed markup is
    /// repaired the way browsers do.
    pub fn parse(html: &str) -> Self {
        let dom = parse_document(RcDom::default(), Default::default()).one(StrTendril::from(html));
        Self { dom }
    }

    /// Serialize the document, doctype included.
    pub fn serialize(&self) -> String {
        let mut bytes = Vec::new();
        let root: SerializableHandle = self.dom.document.clone().into();
        if let Err(e) = serialize(&mut bytes, &root, SerializeOpts::default()) {
            log::warn!("Serialization stopped early: {}", e);
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// All elements named `tag`, in document order.
    ///
    /// The list is a snapshot: nodes inserted or detached afterwards are not
    /// reflected in it.
    pub fn elements(&self, tag: &str) -> Vec<Handle> {
        let mut found = Vec::new();
        collect_elements(&self.dom.document, tag, &mut found);
        found
    }

    /// Put a new `<tag>` with `attrs` and text content `text` where `target`
    /// is, detaching `target`.
    pub fn replace_with_element(
        &mut self,
        target: &Handle,
        tag: &str,
        attrs: Vec<(&str, String)>,
        text: &str,
    ) -> Handle {
        let name = QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from(tag));
        let attrs = attrs
            .into_iter()
            .map(|(name, value)| new_attribute(name, &value))
            .collect();
        let element = self.dom.create_element(name, attrs, ElementFlags::default());
        if !text.is_empty() {
            self.dom
                .append(&element, NodeOrText::AppendText(StrTendril::from(text)));
        }
        self.dom
            .append_before_sibling(target, NodeOrText::AppendNode(element.clone()));
        self.dom.remove_from_parent(target);
        element
    }

    /// Replace every child of `element` with a single text node.
    pub fn set_text(&mut self, element: &Handle, text: &str) {
        let children: Vec<Handle> = element.children.borrow().clone();
        for child in &children {
            self.dom.remove_from_parent(child);
        }
        if !text.is_empty() {
            self.dom
                .append(element, NodeOrText::AppendText(StrTendril::from(text)));
        }
    }
}

// Iterative pre-order walk; nesting depth is bounded only by the input.
fn collect_elements(root: &Handle, tag: &str, found: &mut Vec<Handle>) {
    let mut stack = vec![root.clone()];
    while let Some(node) = stack.pop() {
        if let NodeData::Element { name, .. } = &node.data {
            if (&*name.local).eq_ignore_ascii_case(tag) {
                found.push(node.clone());
            }
        }
        stack.extend(node.children.borrow().iter().rev().cloned());
    }
}

fn new_attribute(name: &str, value: &str) -> Attribute {
    Attribute {
        name: QualName::new(None, Namespace::from(""), LocalName::from(name)),
        value: StrTendril::from(value),
    }
}

/// Value of attribute `name` on `element`, if present.
pub fn attr(element: &Handle, name: &str) -> Option<String> {
    match &element.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| &*a.name.local == name)
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

/// Set attribute `name`, appending it when missing.
pub fn set_attr(element: &Handle, name: &str, value: &str) {
    if let NodeData::Element { attrs, .. } = &element.data {
        let mut attrs = attrs.borrow_mut();
        match attrs.iter_mut().find(|a| &*a.name.local == name) {
            Some(existing) => existing.value = StrTendril::from(value),
            None => attrs.push(new_attribute(name, value)),
        }
    }
}

/// Remove attribute `name`; returns whether it was present.
pub fn remove_attr(element: &Handle, name: &str) -> bool {
    match &element.data {
        NodeData::Element { attrs, .. } => {
            let mut attrs = attrs.borrow_mut();
            let before = attrs.len();
            attrs.retain(|a| &*a.name.local != name);
            attrs.len() != before
        }
        _ => false,
    }
}

/// Concatenated text of the direct text children of `element`.
pub fn text(element: &Handle) -> String {
    element
        .children
        .borrow()
        .iter()
        .filter_map(|child| match &child.data {
            NodeData::Text { contents } => Some(contents.borrow().to_string()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_is_stable_after_reparse() {
        let doc = Document::parse("<!DOCTYPE html><title>x</title><p class=a>hi<br>there");
        let once = doc.serialize();
        assert!(once.starts_with("<!DOCTYPE html>"));
        let twice = Document::parse(&once).serialize();
        assert_eq!(once, twice);
    }

    #[test]
    fn elements_are_listed_in_document_order() {
        let doc = Document::parse(r#"<a href="1"></a><div><a href="2"></a></div><A href="3"></A>"#);
        let hrefs: Vec<_> = doc
            .elements("a")
            .iter()
            .filter_map(|a| attr(a, "href"))
            .collect();
        assert_eq!(hrefs, vec!["1", "2", "3"]);
    }

    #[test]
    fn deeply_nested_documents_can_be_walked() {
        let depth = 20_000;
        let mut html = String::with_capacity(depth * 11 + 32);
        html.push_str("<body>");
        for _ in 0..depth {
            html.push_str("<div>");
        }
        html.push_str(r#"<a href="deep">x</a>"#);
        for _ in 0..depth {
            html.push_str("</div>");
        }
        let doc = Document::parse(&html);
        let anchors = doc.elements("a");
        assert_eq!(anchors.len(), 1);
        assert_eq!(attr(&anchors[0], "href").as_deref(), Some("deep"));
        assert_eq!(doc.elements("div").len(), depth);
    }

    #[test]
    fn attributes_can_be_set_and_removed() {
        let doc = Document::parse(r#"<img src="a.png" srcset="a2.png 2x">"#);
        let img = &doc.elements("img")[0];
        set_attr(img, "src", "b.png");
        set_attr(img, "alt", "b");
        assert!(remove_attr(img, "srcset"));
        assert!(!remove_attr(img, "srcset"));
        assert_eq!(attr(img, "src").as_deref(), Some("b.png"));
        assert!(doc.serialize().contains(r#"<img src="b.png" alt="b">"#));
    }

    #[test]
    fn replaces_node_in_place() {
        let mut doc = Document::parse(
            r#"<head><meta charset="utf-8"><link rel="stylesheet" href="s.css"><title>t</title></head>"#,
        );
        let link = doc.elements("link")[0].clone();
        doc.replace_with_element(&link, "style", vec![], "body{color:red}");
        let out = doc.serialize();
        assert!(out.contains(r#"<meta charset="utf-8"><style>body{color:red}</style><title>t</title>"#));
        assert!(doc.elements("link").is_empty());
    }

    #[test]
    fn set_text_replaces_children() {
        let mut doc = Document::parse(r#"<script src="a.js">old()</script>"#);
        let script = doc.elements("script")[0].clone();
        doc.set_text(&script, "if (a < b && c) { run(); }");
        assert_eq!(text(&script), "if (a < b && c) { run(); }");
        // script text is raw, not entity-escaped
        assert!(doc.serialize().contains("if (a < b && c) { run(); }"));
    }
}
