//! Page manifest loading.
//!
//! A manifest is a TOML file listing the docset metadata and the pages to
//! capture:
//!
//! ```toml
//! [docset]
//! identifier = "example-docs"
//! name = "Example"
//! keyword = "example"
//! fallback_url = "https://docs.example.com/"
//!
//! [[pages]]
//! url = "https://docs.example.com/guide/intro"
//!
//! [[pages]]
//! url = "https://docs.example.com/api/messages"
//! path = "api/messages.html"
//! ```
//!
//! `path` and `slug` default to values derived from the URL path.

use std::path::Path;

use serde::Deserialize;
use url::Url;

use docpack_shared::{BundleMeta, DocpackError, PageTask, Result, url_to_slug};

/// Parsed page manifest.
#[derive(Debug, Deserialize)]
pub(crate) struct Manifest {
    /// Docset metadata section.
    pub docset: DocsetSection,
    /// Pages to capture, in manifest order.
    #[serde(default)]
    pub pages: Vec<PageSpec>,
}

/// `[docset]` section: bundle metadata plus optional stylesheet.
#[derive(Debug, Deserialize)]
pub(crate) struct DocsetSection {
    #[serde(flatten)]
    pub meta: BundleMeta,
    /// Shared stylesheet to bundle locally, if any.
    pub stylesheet: Option<Url>,
    /// URL substrings to drop from the page list (locale variants,
    /// redirect stubs).
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// One `[[pages]]` entry.
#[derive(Debug, Deserialize)]
pub(crate) struct PageSpec {
    pub url: Url,
    pub path: Option<String>,
    pub slug: Option<String>,
}

impl Manifest {
    /// Load and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DocpackError::io(path, e))?;
        toml::from_str(&content)
            .map_err(|e| DocpackError::config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Convert the page list into pipeline tasks, applying the exclude
    /// filter before anything is fetched.
    pub fn tasks(&self) -> Vec<PageTask> {
        self.pages
            .iter()
            .filter(|spec| {
                !self
                    .docset
                    .exclude
                    .iter()
                    .any(|pattern| spec.url.as_str().contains(pattern.as_str()))
            })
            .map(|spec| {
                let slug = spec
                    .slug
                    .clone()
                    .unwrap_or_else(|| url_to_slug(&spec.url));
                let path = spec.path.clone().unwrap_or_else(|| format!("{slug}.html"));
                PageTask {
                    url: spec.url.clone(),
                    path,
                    slug,
                }
            })
            .collect()
    }
}
