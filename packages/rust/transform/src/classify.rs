//! Heading classification and entry-name normalization.
//!
//! Heading text decides which [`EntryKind`] a structural entry gets.
//! The rules mirror common documentation conventions: `class Foo` headings
//! are classes, `GET /v1/...` and dotted `Type.method` headings are methods,
//! call-form `name(...)` headings are functions, everything else is a
//! section.

use std::sync::LazyLock;

use regex::Regex;

use docpack_shared::EntryKind;

/// Normalize visible heading text into an entry name: trim, collapse
/// internal whitespace, strip trailing permalink glyphs (¶, #, link chars).
pub fn normalize_name(text: &str) -> String {
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
    static TRAILING_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[\s¶#§]+$").expect("valid regex"));

    let collapsed = WS_RE.replace_all(text.trim(), " ");
    TRAILING_RE.replace(&collapsed, "").to_string()
}

/// Classify a normalized heading name into an entry kind and display name.
///
/// Returns `None` for empty names (nothing to index).
pub fn classify_heading(name: &str) -> Option<(String, EntryKind)> {
    static CLASS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^class\s+([\w.]+)").expect("valid regex"));
    static HTTP_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)^(get|post|put|patch|delete|head|options)\s+/").expect("valid regex")
    });
    static DOTTED_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[A-Za-z_]\w*(\.\w+)+(\(.*\))?$").expect("valid regex"));
    static CALL_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[A-Za-z_]\w*\s*\(.*\)$").expect("valid regex"));

    if name.is_empty() {
        return None;
    }

    if let Some(caps) = CLASS_RE.captures(name) {
        return Some((caps[1].to_string(), EntryKind::Class));
    }
    if HTTP_RE.is_match(name) {
        return Some((name.to_string(), EntryKind::Method));
    }
    if DOTTED_RE.is_match(name) {
        return Some((name.to_string(), EntryKind::Method));
    }
    if CALL_RE.is_match(name) {
        return Some((name.to_string(), EntryKind::Function));
    }

    Some((name.to_string(), EntryKind::Section))
}
