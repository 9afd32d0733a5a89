//! HTML rewriting pass: chrome stripping, anchor injection, link rewriting.
//!
//! `scraper`'s DOM is read-only, so rewriting is done as a single serializer
//! walk over the parsed tree that emits rewritten HTML as it goes. The walk
//! is deterministic: the same input and context always produce the same
//! output bytes.

use std::sync::LazyLock;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use scraper::{ElementRef, Html, Selector};
use tracing::trace;

use crate::TransformContext;
use crate::classify::{classify_heading, normalize_name};

/// Percent-encoding set for anchor names: everything except unreserved
/// characters (RFC 3986 `ALPHA / DIGIT / "-" / "." / "_" / "~"`).
pub(crate) const ANCHOR_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Class attribute carried by injected anchor elements.
pub const ANCHOR_CLASS: &str = "dash-anchor";

/// Elements with no closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose text children are emitted without entity escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

static CHROME_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        "nav",
        "aside",
        "footer",
        "script",
        "header[role=\"banner\"]",
        "[role=\"navigation\"]",
        ".sidebar",
        ".site-header",
        ".site-footer",
        ".top-nav",
        ".toc",
    ]
    .iter()
    .map(|s| Selector::parse(s).expect("valid selector"))
    .collect()
});

static BREADCRUMB_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [".breadcrumb", ".breadcrumbs", "[aria-label=\"breadcrumb\"]"]
        .iter()
        .map(|s| Selector::parse(s).expect("valid selector"))
        .collect()
});

static HEADING_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").expect("valid selector"));

/// Serialize the parsed document, applying the rewrites enabled in `ctx`.
pub fn rewrite_document(document: &Html, ctx: &TransformContext<'_>) -> String {
    let mut out = String::new();
    for child in document.tree.root().children() {
        serialize_node(child, ctx, &mut out, false);
    }
    out
}

fn serialize_node(
    node: ego_tree::NodeRef<'_, scraper::Node>,
    ctx: &TransformContext<'_>,
    out: &mut String,
    raw_text: bool,
) {
    match node.value() {
        scraper::Node::Document | scraper::Node::Fragment => {
            for child in node.children() {
                serialize_node(child, ctx, out, raw_text);
            }
        }
        scraper::Node::Doctype(doctype) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(&doctype.name());
            out.push('>');
        }
        scraper::Node::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(&comment);
            out.push_str("-->");
        }
        scraper::Node::Text(text) => {
            if raw_text {
                out.push_str(&text);
            } else {
                push_escaped_text(out, &text);
            }
        }
        scraper::Node::Element(_) => {
            let element = ElementRef::wrap(node).expect("element node wraps");
            serialize_element(element, ctx, out);
        }
        scraper::Node::ProcessingInstruction(_) => {}
    }
}

fn serialize_element(element: ElementRef<'_>, ctx: &TransformContext<'_>, out: &mut String) {
    let name = element.value().name();

    if ctx.options.strip_chrome && is_chrome(&element) && !is_breadcrumb(&element) {
        trace!(element = name, "stripping chrome element");
        // Breadcrumb trails often live inside stripped navigation chrome;
        // they carry page context, so they survive the strip.
        emit_preserved_descendants(element, ctx, out);
        return;
    }

    if ctx.options.inject_anchors && HEADING_SELECTOR.matches(&element) {
        emit_anchor_for_heading(&element, out);
    }

    out.push('<');
    out.push_str(name);
    for (attr, value) in element.value().attrs() {
        out.push(' ');
        out.push_str(attr);
        out.push_str("=\"");
        let rewritten = rewrite_attr(name, attr, value, ctx);
        push_escaped_attr(out, rewritten.as_deref().unwrap_or(value));
        out.push('"');
    }
    out.push('>');

    if VOID_ELEMENTS.contains(&name) {
        return;
    }

    let raw = RAW_TEXT_ELEMENTS.contains(&name);
    for child in element.children() {
        serialize_node(child, ctx, out, raw);
    }

    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// Walk a stripped subtree and serialize any breadcrumb elements found in it.
fn emit_preserved_descendants(
    element: ElementRef<'_>,
    ctx: &TransformContext<'_>,
    out: &mut String,
) {
    for child in element.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            if is_breadcrumb(&child_el) {
                serialize_element(child_el, ctx, out);
            } else {
                emit_preserved_descendants(child_el, ctx, out);
            }
        }
    }
}

/// Emit a `<a class="dash-anchor" name="Kind/encoded-name">` marker ahead of
/// a heading, if the heading classifies to an entry.
fn emit_anchor_for_heading(heading: &ElementRef<'_>, out: &mut String) {
    let text: String = heading.text().collect();
    let normalized = normalize_name(&text);
    let Some((name, kind)) = classify_heading(&normalized) else {
        return;
    };

    let encoded = utf8_percent_encode(&name, ANCHOR_ENCODE_SET);
    out.push_str("<a class=\"");
    out.push_str(ANCHOR_CLASS);
    out.push_str("\" name=\"");
    out.push_str(kind.as_str());
    out.push('/');
    out.push_str(&encoded.to_string());
    out.push_str("\"></a>");
}

/// Rewrite a single attribute value, or `None` to keep it verbatim.
fn rewrite_attr(
    element: &str,
    attr: &str,
    value: &str,
    ctx: &TransformContext<'_>,
) -> Option<String> {
    if element == "a" && attr == "href" && ctx.options.rewrite_links {
        return rewrite_link(value, ctx);
    }
    if element == "link" && attr == "href" {
        if let Some(stylesheet) = ctx.stylesheet {
            if let Ok(resolved) = ctx.task.url.join(value) {
                if resolved == stylesheet.url {
                    return Some(relative_prefix(&ctx.task.path) + &stylesheet.file_name);
                }
            }
        }
    }
    None
}

/// Rewrite an `href` pointing at another captured page to a relative bundle
/// path, preserving any fragment. External and non-HTTP links are untouched.
fn rewrite_link(href: &str, ctx: &TransformContext<'_>) -> Option<String> {
    if href.starts_with('#') || href.starts_with("mailto:") || href.starts_with("javascript:") {
        return None;
    }

    let resolved = ctx.task.url.join(href).ok()?;
    let fragment = resolved.fragment().map(str::to_string);

    let mut key = resolved;
    key.set_fragment(None);

    let target = ctx.links.resolve(&key)?;
    let mut rewritten = relative_prefix(&ctx.task.path) + target;
    if let Some(fragment) = fragment {
        rewritten.push('#');
        rewritten.push_str(&fragment);
    }
    Some(rewritten)
}

/// `../` prefix that climbs from the page's directory back to the documents
/// root, so root-relative bundle paths resolve from nested pages.
fn relative_prefix(page_path: &str) -> String {
    let depth = page_path.matches('/').count();
    "../".repeat(depth)
}

fn is_chrome(element: &ElementRef<'_>) -> bool {
    CHROME_SELECTORS.iter().any(|s| s.matches(element))
}

fn is_breadcrumb(element: &ElementRef<'_>) -> bool {
    BREADCRUMB_SELECTORS.iter().any(|s| s.matches(element))
}

// ---------------------------------------------------------------------------
// Escaping
// ---------------------------------------------------------------------------

fn push_escaped_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
}

fn push_escaped_attr(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
}
