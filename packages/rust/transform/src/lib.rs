//! Page transformation: pure rewriting of fetched HTML into standalone
//! bundle pages plus their index entries.
//!
//! [`transform`] is a pure function from input HTML and a
//! [`TransformContext`] to a [`TransformedPage`]; it performs no I/O, so the
//! same input always yields the same output. The pipeline feeds it fetched
//! bodies; tests feed it literals.

use std::collections::HashMap;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::instrument;
use url::Url;

use docpack_shared::{DocpackError, PageTask, Result, TransformConfig, TransformedPage};

pub mod classify;
pub mod extract;
pub mod rewrite;

pub use extract::extract_entries;
pub use rewrite::ANCHOR_CLASS;

// ---------------------------------------------------------------------------
// Options and context
// ---------------------------------------------------------------------------

/// Which rewrite passes run on each page.
#[derive(Debug, Clone)]
pub struct TransformOptions {
    /// Remove navigation chrome (nav bars, sidebars, footers, scripts).
    pub strip_chrome: bool,
    /// Inject anchor markers ahead of headings.
    pub inject_anchors: bool,
    /// Rewrite internal links to relative bundle paths.
    pub rewrite_links: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            strip_chrome: true,
            inject_anchors: true,
            rewrite_links: true,
        }
    }
}

impl From<&TransformConfig> for TransformOptions {
    fn from(config: &TransformConfig) -> Self {
        Self {
            strip_chrome: config.strip_chrome,
            inject_anchors: config.inject_anchors,
            rewrite_links: config.rewrite_links,
        }
    }
}

/// A stylesheet shared by the captured pages, bundled locally so pages
/// render offline. `<link>` elements pointing at `url` are rewritten to
/// `file_name` at the documents root.
#[derive(Debug, Clone)]
pub struct SharedStylesheet {
    pub url: Url,
    pub file_name: String,
}

impl SharedStylesheet {
    /// Derive the local file name from the URL's last path segment.
    pub fn new(url: Url) -> Self {
        let file_name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|s| !s.is_empty())
            .unwrap_or("shared.css")
            .to_string();
        Self { url, file_name }
    }
}

/// Maps captured source URLs to their bundle-relative page paths, for
/// internal link rewriting.
#[derive(Debug, Default)]
pub struct LinkMap {
    paths: HashMap<String, String>,
}

impl LinkMap {
    /// Build the map from the run's full task list.
    pub fn from_tasks(tasks: &[PageTask]) -> Self {
        let mut paths = HashMap::with_capacity(tasks.len());
        for task in tasks {
            paths.insert(normalize_url(&task.url), task.path.clone());
        }
        Self { paths }
    }

    /// Bundle path for a captured URL, or `None` if the URL is not part of
    /// the run.
    pub fn resolve(&self, url: &Url) -> Option<&str> {
        self.paths.get(&normalize_url(url)).map(String::as_str)
    }
}

/// Canonical string form for link-map keys: fragment dropped, trailing
/// slash trimmed so `/guide` and `/guide/` compare equal.
fn normalize_url(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.as_str().trim_end_matches('/').to_string()
}

/// Everything one page transformation needs, borrowed from the run.
#[derive(Debug)]
pub struct TransformContext<'a> {
    pub task: &'a PageTask,
    pub options: &'a TransformOptions,
    pub links: &'a LinkMap,
    pub stylesheet: Option<&'a SharedStylesheet>,
}

// ---------------------------------------------------------------------------
// Transformation
// ---------------------------------------------------------------------------

static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static H1_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1").expect("valid selector"));
static BODY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid selector"));

/// Transform one fetched page body into a standalone bundle page.
///
/// Fails with a parse error when the body yields no elements at all
/// (binary or non-HTML payloads); the caller records the page as failed
/// and continues with the rest of the run.
#[instrument(skip_all, fields(page = %ctx.task.path))]
pub fn transform(html: &str, ctx: &TransformContext<'_>) -> Result<TransformedPage> {
    let document = Html::parse_document(html);

    if !has_content(&document) {
        return Err(DocpackError::parse(
            ctx.task.path.clone(),
            "no parseable content",
        ));
    }

    let title = page_title(&document, &ctx.task.slug);
    let rewritten = rewrite::rewrite_document(&document, ctx);
    let entries = extract::extract_entries(&rewritten, &ctx.task.path, &title);

    Ok(TransformedPage {
        path: ctx.task.path.clone(),
        title,
        html: rewritten,
        entries,
    })
}

/// Whether the parsed document has any element inside `<body>`. Plain text
/// and binary payloads parse to an empty or text-only body.
fn has_content(document: &Html) -> bool {
    document
        .select(&BODY_SELECTOR)
        .next()
        .is_some_and(|body| body.children().any(|c| c.value().is_element()))
}

/// Page title: `<title>` cut at common site-name separators, falling back
/// to the first `<h1>`, then the slug.
fn page_title(document: &Html, slug: &str) -> String {
    if let Some(title_el) = document.select(&TITLE_SELECTOR).next() {
        let raw: String = title_el.text().collect();
        let cut = cut_site_suffix(&raw);
        let normalized = classify::normalize_name(cut);
        if !normalized.is_empty() {
            return normalized;
        }
    }

    if let Some(h1) = document.select(&H1_SELECTOR).next() {
        let raw: String = h1.text().collect();
        let normalized = classify::normalize_name(&raw);
        if !normalized.is_empty() {
            return normalized;
        }
    }

    slug.to_string()
}

/// Cut a `<title>` at the separator before a trailing site name
/// (`Page | Site`, `Page - Site`, `Page :: Site`).
fn cut_site_suffix(title: &str) -> &str {
    for separator in [" | ", " - ", " – ", " :: "] {
        if let Some((head, _)) = title.split_once(separator) {
            return head;
        }
    }
    title
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
