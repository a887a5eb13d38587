//! Live and fetched HTML documents.
//!
//! The live document is an abstract capability supplied by the host page.
//! [`MemoryDocument`] implements it over an HTML string for headless hosts:
//! each swap parses the page, splices the parsed replacement into the tree
//! under the slot and serializes the page back with html5ever.

use parking_lot::Mutex;
use scraper::node::Doctype;
use scraper::{ElementRef, Html};

use crate::form::HtmlForm;

/// The page the hydrator swaps content into.
pub trait LiveDocument: Send + Sync {
    /// Inner HTML of the first element with id `id`, if any.
    fn inner_html(&self, id: &str) -> Option<String>;

    /// Replaces the inner HTML of the element with id `id`.
    ///
    /// Returns false when no such element exists; the document is unchanged.
    fn set_inner_html(&self, id: &str, html: &str) -> bool;

    /// Field snapshot of the `<form>` with id `id`, if any.
    fn form(&self, id: &str) -> Option<HtmlForm>;
}

/// A parsed section response.
///
/// Not `Send`: parse, read and drop it without awaiting in between.
pub struct FetchedDocument {
    html: Html,
}

impl FetchedDocument {
    /// Parses `body` as a full HTML document. Never fails; malformed
    /// markup is recovered the way browsers recover it.
    pub fn parse(body: &str) -> Self {
        let html = Html::parse_document(body);
        for error in &html.errors {
            tracing::trace!(%error, "Recovered HTML parse error");
        }
        Self { html }
    }

    /// Number of recovered parse errors.
    pub fn parse_error_count(&self) -> usize {
        self.html.errors.len()
    }

    /// Inner HTML of the first element with id `id`, if any.
    pub fn inner_html(&self, id: &str) -> Option<String> {
        find_by_id(&self.html, id).map(|element| element.inner_html())
    }
}

impl std::fmt::Debug for FetchedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedDocument")
            .field("parse_errors", &self.html.errors.len())
            .finish()
    }
}

/// In-memory live document backed by an HTML string.
#[derive(Debug)]
pub struct MemoryDocument {
    source: Mutex<String>,
}

impl MemoryDocument {
    /// Creates a document from full page markup.
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            source: Mutex::new(html.into()),
        }
    }

    /// Current page markup.
    pub fn html(&self) -> String {
        self.source.lock().clone()
    }
}

impl LiveDocument for MemoryDocument {
    fn inner_html(&self, id: &str) -> Option<String> {
        let html = Html::parse_document(&self.source.lock());
        find_by_id(&html, id).map(|element| element.inner_html())
    }

    fn set_inner_html(&self, id: &str, replacement: &str) -> bool {
        let mut source = self.source.lock();
        let mut html = Html::parse_document(&source);
        if !splice_inner_html(&mut html, id, replacement) {
            return false;
        }

        *source = serialize_document(&html);
        true
    }

    fn form(&self, id: &str) -> Option<HtmlForm> {
        let html = Html::parse_document(&self.source.lock());
        find_by_id(&html, id)
            .filter(|element| element.value().name() == "form")
            .map(HtmlForm::from_element)
    }
}

/// First element in tree order whose id attribute equals `id`.
fn find_by_id<'a>(html: &'a Html, id: &str) -> Option<ElementRef<'a>> {
    html.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().id() == Some(id))
}

/// Replaces the children of the element with id `id` by the nodes parsed from
/// `replacement`. For a `<template>` the template contents are replaced.
fn splice_inner_html(html: &mut Html, id: &str, replacement: &str) -> bool {
    let Some(target) = find_by_id(html, id) else {
        return false;
    };
    let container = match target.first_child() {
        Some(contents) if target.value().name() == "template" && contents.value().is_fragment() => {
            contents.id()
        }
        _ => target.id(),
    };
    let existing: Vec<_> = html
        .tree
        .get(container)
        .map(|node| node.children().map(|child| child.id()).collect())
        .unwrap_or_default();

    for child in existing {
        if let Some(mut node) = html.tree.get_mut(child) {
            node.detach();
        }
    }

    // The fragment parser wraps the nodes in an `<html>` element
    let fragment = Html::parse_fragment(replacement);
    let fragment_root = html.tree.extend_tree(fragment.tree).id();
    let incoming: Vec<_> = html
        .tree
        .get(fragment_root)
        .and_then(|root| root.children().find(|child| child.value().is_element()))
        .map(|wrapper| wrapper.children().map(|child| child.id()).collect())
        .unwrap_or_default();

    let Some(mut container) = html.tree.get_mut(container) else {
        return false;
    };
    for child in incoming {
        container.append_id(child);
    }
    true
}

/// Serializes the whole document, keeping the doctype's public and system ids.
fn serialize_document(html: &Html) -> String {
    let out = html.html();
    let doctype = html
        .tree
        .root()
        .children()
        .find_map(|node| node.value().as_doctype());

    match doctype {
        Some(doctype) if !doctype.public_id().is_empty() || !doctype.system_id().is_empty() => {
            let short = format!("<!DOCTYPE {}>", doctype.name());
            out.replacen(&short, &full_doctype(doctype), 1)
        }
        _ => out,
    }
}

fn full_doctype(doctype: &Doctype) -> String {
    let mut out = format!("<!DOCTYPE {}", doctype.name());
    match (doctype.public_id(), doctype.system_id()) {
        ("", system) => out.push_str(&format!(" SYSTEM \"{system}\"")),
        (public, "") => out.push_str(&format!(" PUBLIC \"{public}\"")),
        (public, system) => out.push_str(&format!(" PUBLIC \"{public}\" \"{system}\"")),
    }
    out.push('>');
    out
}
