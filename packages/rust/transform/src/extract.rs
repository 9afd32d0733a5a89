//! Entry extraction from transformed pages.
//!
//! Entries are derived from the anchor markers the rewrite pass injected,
//! not from the original headings. That makes the transformed page the
//! single source of truth: re-extracting from a page already on disk yields
//! exactly the entries its generation produced.

use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use scraper::{Html, Selector};
use tracing::warn;

use docpack_shared::{EntryKind, IndexEntry};

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.dash-anchor[name]").expect("valid selector"));

/// Extract the page's index entries in document order.
///
/// The page-level Guide entry (named after `title`, no anchor) comes first,
/// then one entry per anchor marker. Markers with names that do not parse
/// are skipped with a warning rather than failing the page.
pub fn extract_entries(html: &str, page_path: &str, title: &str) -> Vec<IndexEntry> {
    let document = Html::parse_document(html);
    let mut entries = Vec::new();

    entries.push(IndexEntry {
        name: title.to_string(),
        kind: EntryKind::Guide,
        page_path: page_path.to_string(),
        anchor: String::new(),
    });

    for anchor in document.select(&ANCHOR_SELECTOR) {
        let Some(marker) = anchor.value().attr("name") else {
            continue;
        };
        match parse_marker(marker) {
            Some((name, kind)) => entries.push(IndexEntry {
                name,
                kind,
                page_path: page_path.to_string(),
                anchor: marker.to_string(),
            }),
            None => {
                warn!(page = page_path, marker, "skipping unparseable anchor marker");
            }
        }
    }

    entries
}

/// Parse a `Kind/percent-encoded-name` anchor marker.
fn parse_marker(marker: &str) -> Option<(String, EntryKind)> {
    let (kind_str, encoded) = marker.split_once('/')?;
    let kind: EntryKind = kind_str.parse().ok()?;
    let name = percent_decode_str(encoded).decode_utf8().ok()?;
    if name.is_empty() {
        return None;
    }
    Some((name.into_owned(), kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guide_entry_always_first() {
        let entries = extract_entries("<html><body><p>hi</p></body></html>", "intro.html", "Intro");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::Guide);
        assert_eq!(entries[0].name, "Intro");
        assert_eq!(entries[0].location(), "intro.html");
    }

    #[test]
    fn anchors_extracted_in_document_order() {
        let html = r#"<html><body>
            <a class="dash-anchor" name="Section/Overview"></a><h2>Overview</h2>
            <a class="dash-anchor" name="Function/send%28%29"></a><h3>send()</h3>
            <a class="dash-anchor" name="Class/Client"></a><h2>class Client</h2>
        </body></html>"#;

        let entries = extract_entries(html, "api.html", "API");
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["API", "Overview", "send()", "Client"]);
        assert_eq!(entries[2].kind, EntryKind::Function);
        assert_eq!(entries[2].location(), "api.html#Function/send%28%29");
    }

    #[test]
    fn unparseable_markers_are_skipped() {
        let html = r#"<html><body>
            <a class="dash-anchor" name="nonsense"></a>
            <a class="dash-anchor" name="Widget/Thing"></a>
            <a class="dash-anchor" name="Section/Valid"></a>
        </body></html>"#;

        let entries = extract_entries(html, "p.html", "P");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].name, "Valid");
    }

    #[test]
    fn plain_anchors_are_ignored() {
        let html = r##"<html><body><a name="legacy-anchor" href="#x">x</a></body></html>"##;
        let entries = extract_entries(html, "p.html", "P");
        assert_eq!(entries.len(), 1);
    }
}
