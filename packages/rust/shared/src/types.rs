//! Core domain types for the docset generation pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::FetchErrorKind;

// ---------------------------------------------------------------------------
// EntryKind
// ---------------------------------------------------------------------------

/// The fixed enumeration of indexable entry types.
///
/// The string form is stable: it appears verbatim in anchor markers and in
/// the `type` column of the lookup store, so viewers can group by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryKind {
    Class,
    Function,
    Method,
    Section,
    Guide,
}

impl EntryKind {
    /// Stable string form used in anchors and index rows.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Class => "Class",
            Self::Function => "Function",
            Self::Method => "Method",
            Self::Section => "Section",
            Self::Guide => "Guide",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Class" => Ok(Self::Class),
            "Function" => Ok(Self::Function),
            "Method" => Ok(Self::Method),
            "Section" => Ok(Self::Section),
            "Guide" => Ok(Self::Guide),
            other => Err(format!("unknown entry kind: {other}")),
        }
    }
}

impl Serialize for EntryKind {
    fn serialize<S: serde::Serializer>(&self, ser: S) -> std::result::Result<S::Ok, S::Error> {
        ser.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EntryKind {
    fn deserialize<D: serde::Deserializer<'de>>(de: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(de)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// PageTask
// ---------------------------------------------------------------------------

/// One documentation page to capture, produced by the discovery collaborator.
///
/// Immutable once created; consumed by the fetch/transform/extract stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTask {
    /// Source URL to fetch.
    pub url: Url,
    /// Target relative path inside the bundle's documents root
    /// (e.g. `guide/installation.html`).
    pub path: String,
    /// Logical slug used for anchor naming and logging.
    pub slug: String,
}

impl PageTask {
    /// Build a task from a URL, deriving path and slug from the URL path.
    pub fn from_url(url: Url) -> Self {
        let slug = url_to_slug(&url);
        let path = format!("{slug}.html");
        Self { url, path, slug }
    }
}

/// Convert a URL path to a filesystem-safe slug (`guide/intro`).
pub fn url_to_slug(url: &Url) -> String {
    let cleaned = url
        .path()
        .trim_start_matches('/')
        .trim_end_matches('/')
        .trim_end_matches(".html")
        .trim_end_matches(".htm");

    if cleaned.is_empty() {
        "index".to_string()
    } else {
        cleaned.to_string()
    }
}

// ---------------------------------------------------------------------------
// FetchResult
// ---------------------------------------------------------------------------

/// A fetch failure record: the offending URL plus error classification.
#[derive(Debug, Clone)]
pub struct FetchFailure {
    /// The URL that failed.
    pub url: Url,
    /// What went wrong.
    pub kind: FetchErrorKind,
    /// Number of attempts made before giving up.
    pub attempts: u32,
}

/// Outcome of retrieving one [`PageTask`].
///
/// Owned transiently by the orchestrator between the fetch and transform
/// stages. A failure never aborts the run; the page is simply excluded.
#[derive(Debug, Clone)]
pub enum FetchResult {
    /// The page body was retrieved.
    Fetched {
        task: PageTask,
        status: u16,
        body: String,
    },
    /// The fetch failed after retries.
    Failed { task: PageTask, error: FetchFailure },
}

impl FetchResult {
    /// The originating task, regardless of outcome.
    pub fn task(&self) -> &PageTask {
        match self {
            Self::Fetched { task, .. } | Self::Failed { task, .. } => task,
        }
    }

    /// Whether the fetch succeeded.
    pub fn is_fetched(&self) -> bool {
        matches!(self, Self::Fetched { .. })
    }
}

// ---------------------------------------------------------------------------
// IndexEntry / TransformedPage
// ---------------------------------------------------------------------------

/// One indexable unit within a page.
///
/// `(name, kind, page_path, anchor)` together identify a row; the lookup
/// store collapses exact duplicates. The anchor is empty for page-level
/// Guide entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Display name (normalized heading or page title).
    pub name: String,
    /// Entry type.
    pub kind: EntryKind,
    /// Relative path of the containing page inside the bundle.
    pub page_path: String,
    /// Anchor marker name within the page, or empty for the page itself.
    pub anchor: String,
}

impl IndexEntry {
    /// The viewer-facing location: `<page-path>#<anchor>`, or the bare page
    /// path when the anchor is empty.
    pub fn location(&self) -> String {
        if self.anchor.is_empty() {
            self.page_path.clone()
        } else {
            format!("{}#{}", self.page_path, self.anchor)
        }
    }
}

/// Rewritten HTML for a page plus the entries extracted from it.
///
/// Derived deterministically from a fetched body; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct TransformedPage {
    /// Relative path inside the bundle's documents root.
    pub path: String,
    /// Page title (used for the implicit Guide entry).
    pub title: String,
    /// The rewritten, standalone HTML.
    pub html: String,
    /// Extracted entries in document order (Guide entry first).
    pub entries: Vec<IndexEntry>,
}

// ---------------------------------------------------------------------------
// BundleMeta
// ---------------------------------------------------------------------------

/// Metadata descriptor written verbatim into the bundle's `Info.plist`.
///
/// Values are supplied by an external collaborator (the page manifest).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleMeta {
    /// Bundle identifier (e.g. `claude-api`).
    pub identifier: String,
    /// Human-readable bundle name (also names the `.docset` directory).
    pub name: String,
    /// Viewer search keyword.
    pub keyword: String,
    /// Online fallback URL for pages missing from the bundle.
    pub fallback_url: String,
    /// Relative path of the page the viewer opens first.
    #[serde(default = "default_index_page")]
    pub index_page: String,
}

fn default_index_page() -> String {
    "index.html".into()
}

// ---------------------------------------------------------------------------
// RunSummary / Stage
// ---------------------------------------------------------------------------

/// A recorded per-page failure, kept for the final summary.
#[derive(Debug, Clone, Serialize)]
pub struct PageFailure {
    /// The page's source URL.
    pub url: String,
    /// Human-readable description of what went wrong.
    pub reason: String,
}

/// Explicit run-wide counters, threaded through and returned by the
/// orchestrator rather than held in ambient global state.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Pages supplied by discovery (after filtering).
    pub pages_discovered: usize,
    /// Pages fetched successfully.
    pub pages_fetched: usize,
    /// Pages indexed into the bundle.
    pub pages_indexed: usize,
    /// Total index entries written.
    pub entries_indexed: usize,
    /// Per-page failures (fetch and parse), in page order.
    pub failures: Vec<PageFailure>,
    /// Whether an archive was produced, and where.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<String>,
    /// When the run completed.
    pub completed_at: DateTime<Utc>,
    /// Total elapsed time in milliseconds.
    pub elapsed_ms: u64,
}

/// Orchestrator state machine stages.
///
/// Per-page failures do not transition to `Failed`; only fatal conditions do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discovering,
    Fetching,
    Transforming,
    Extracting,
    Indexing,
    Assembling,
    Archiving,
    Done,
    Failed,
}

impl Stage {
    /// Stable lowercase name for logging.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discovering => "discovering",
            Self::Fetching => "fetching",
            Self::Transforming => "transforming",
            Self::Extracting => "extracting",
            Self::Indexing => "indexing",
            Self::Assembling => "assembling",
            Self::Archiving => "archiving",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
