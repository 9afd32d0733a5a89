//! End-to-end `generate` pipeline: page tasks → fetch → transform → index →
//! bundle → archive.
//!
//! The pipeline moves through explicit [`Stage`]s and keeps all run state in
//! locals; the returned [`RunSummary`] is the only output besides the bundle
//! itself. Per-page failures (fetch, parse) are recorded and skipped; fatal
//! failures (bundle or index cannot be created or written) abort the run.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use url::Url;

use docpack_bundle::BundleLayout;
use docpack_fetch::{FetchConfig, PageFetcher};
use docpack_index::IndexStore;
use docpack_shared::{
    BundleMeta, DocpackError, FetchResult, PageFailure, PageTask, Result, RunSummary, Stage,
};
use docpack_transform::{
    LinkMap, SharedStylesheet, TransformContext, TransformOptions, transform,
};

/// Configuration for one generation run.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    /// Directory the `.docset` (and archive) are written into.
    pub output_dir: PathBuf,
    /// Bundle metadata, written to `Info.plist`.
    pub meta: BundleMeta,
    /// Fetch-stage configuration.
    pub fetch: FetchConfig,
    /// Transform-stage toggles.
    pub transform: TransformOptions,
    /// Whether to compress the finished bundle into a `.tgz`.
    pub archive: bool,
    /// Shared stylesheet to bundle locally, if any.
    pub stylesheet_url: Option<Url>,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a page fetch completes (either way).
    fn page_fetched(&self, url: &str, current: usize, total: usize);
    /// Called when a page is transformed and indexed.
    fn page_processed(&self, path: &str, current: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_fetched(&self, _url: &str, _current: usize, _total: usize) {}
    fn page_processed(&self, _path: &str, _current: usize, _total: usize) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Run the full generation pipeline.
///
/// 1. Validate the task list
/// 2. Create the bundle layout and a fresh lookup index
/// 3. Fetch all pages with bounded parallelism
/// 4. Transform, write, and index each fetched page in task order
/// 5. Verify index/content consistency, write metadata, archive
#[instrument(skip_all, fields(bundle = %config.meta.name, pages = tasks.len()))]
pub async fn generate(
    tasks: &[PageTask],
    config: &GenerateConfig,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let start = Instant::now();

    info!(stage = %Stage::Discovering, "validating page tasks");
    let tasks = dedup_tasks(tasks);
    if tasks.is_empty() {
        // Fail before touching the filesystem: a run with nothing to do
        // must not leave a partial bundle behind.
        info!(stage = %Stage::Failed, "no pages to capture");
        return Err(DocpackError::validation("no pages to capture"));
    }

    progress.phase("Preparing bundle");
    let layout = BundleLayout::create(&config.output_dir, &config.meta.name)?;
    let store = IndexStore::create(&layout.index_path()).await?;

    let fetcher = PageFetcher::new(config.fetch.clone())?;
    let links = LinkMap::from_tasks(&tasks);
    let stylesheet = bundle_stylesheet(config, &fetcher, &layout).await;

    info!(stage = %Stage::Fetching, pages = tasks.len(), "fetching pages");
    progress.phase("Fetching pages");
    let results = fetcher.fetch_all(&tasks).await;

    let total = tasks.len();
    let mut failures: Vec<PageFailure> = Vec::new();
    let mut pages_fetched = 0usize;
    let mut pages_indexed = 0usize;
    let mut entries_indexed = 0usize;

    info!(stage = %Stage::Transforming, "processing pages");
    progress.phase("Processing pages");
    for (position, result) in results.iter().enumerate() {
        progress.page_fetched(result.task().url.as_str(), position + 1, total);

        let (task, body) = match result {
            FetchResult::Fetched { task, body, .. } => {
                pages_fetched += 1;
                (task, body)
            }
            FetchResult::Failed { task, error } => {
                failures.push(PageFailure {
                    url: task.url.to_string(),
                    reason: format!("fetch failed after {} attempts: {}", error.attempts, error.kind),
                });
                continue;
            }
        };

        let ctx = TransformContext {
            task,
            options: &config.transform,
            links: &links,
            stylesheet: stylesheet.as_ref(),
        };
        let page = match transform(body, &ctx) {
            Ok(page) => page,
            Err(e) if e.is_page_scoped() => {
                warn!(page = task.path, error = %e, "skipping unprocessable page");
                failures.push(PageFailure {
                    url: task.url.to_string(),
                    reason: e.to_string(),
                });
                continue;
            }
            Err(e) => return Err(e),
        };
        debug!(
            stage = %Stage::Extracting,
            page = page.path,
            entries = page.entries.len(),
            "extracted entries"
        );

        // Page content lands before its index rows, so every committed row
        // points at a page that exists.
        layout.write_page(&page.path, &page.html)?;
        entries_indexed += store.insert_page_entries(&page.entries).await? as usize;
        debug!(stage = %Stage::Indexing, page = page.path, "indexed page");
        pages_indexed += 1;
        progress.page_processed(&page.path, position + 1, total);
    }

    info!(stage = %Stage::Assembling, "verifying bundle");
    verify_index_consistency(&layout, &store).await?;
    layout.write_metadata(&config.meta)?;

    let archive_path = if config.archive {
        info!(stage = %Stage::Archiving, "compressing bundle");
        progress.phase("Archiving");
        Some(layout.archive()?.display().to_string())
    } else {
        None
    };

    let summary = RunSummary {
        pages_discovered: total,
        pages_fetched,
        pages_indexed,
        entries_indexed,
        failures,
        archive_path,
        completed_at: Utc::now(),
        elapsed_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        stage = %Stage::Done,
        pages = summary.pages_indexed,
        entries = summary.entries_indexed,
        failures = summary.failures.len(),
        elapsed_ms = summary.elapsed_ms,
        "generation complete"
    );
    progress.done(&summary);
    Ok(summary)
}

/// Drop tasks whose bundle path repeats an earlier task's, keeping the
/// first occurrence.
fn dedup_tasks(tasks: &[PageTask]) -> Vec<PageTask> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(tasks.len());
    for task in tasks {
        if seen.insert(task.path.clone()) {
            unique.push(task.clone());
        } else {
            warn!(path = task.path, url = %task.url, "dropping duplicate page path");
        }
    }
    unique
}

/// Fetch and bundle the shared stylesheet, if configured.
///
/// A missing stylesheet degrades the bundle's appearance, not its content,
/// so failure here downgrades to a warning instead of failing the run.
async fn bundle_stylesheet(
    config: &GenerateConfig,
    fetcher: &PageFetcher,
    layout: &BundleLayout,
) -> Option<SharedStylesheet> {
    let url = config.stylesheet_url.clone()?;
    let stylesheet = SharedStylesheet::new(url);

    match fetcher.fetch_one(&stylesheet.url).await {
        Ok(css) => match layout.write_resource(&stylesheet.file_name, &css) {
            Ok(()) => Some(stylesheet),
            Err(e) => {
                warn!(error = %e, "failed to write stylesheet, pages keep remote links");
                None
            }
        },
        Err(e) => {
            warn!(error = %e, "failed to fetch stylesheet, pages keep remote links");
            None
        }
    }
}

/// Every page path referenced by the index must exist in the bundle.
async fn verify_index_consistency(layout: &BundleLayout, store: &IndexStore) -> Result<()> {
    for path in store.indexed_page_paths().await? {
        if !layout.contains_page(&path) {
            return Err(DocpackError::validation(format!(
                "index references missing page: {path}"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use docpack_shared::IndexEntry;
    use wiremock::matchers::{method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn page_html(title: &str, headings: &[&str]) -> String {
        let body: String = headings
            .iter()
            .map(|h| format!("<h2>{h}</h2><p>text</p>"))
            .collect();
        format!("<html><head><title>{title} | Docs</title></head><body><main><h1>{title}</h1>{body}</main></body></html>")
    }

    async fn mount_page(server: &MockServer, slug: &str, html: &str) {
        Mock::given(method("GET"))
            .and(url_path(format!("/{slug}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(html.to_string()))
            .mount(server)
            .await;
    }

    fn tasks_for(server_uri: &str, slugs: &[&str]) -> Vec<PageTask> {
        slugs
            .iter()
            .map(|slug| PageTask::from_url(Url::parse(&format!("{server_uri}/{slug}")).unwrap()))
            .collect()
    }

    fn test_config(output_dir: &Path, archive: bool) -> GenerateConfig {
        GenerateConfig {
            output_dir: output_dir.to_path_buf(),
            meta: BundleMeta {
                identifier: "example-docs".into(),
                name: "Example".into(),
                keyword: "example".into(),
                fallback_url: "https://docs.example.com/".into(),
                index_page: "index.html".into(),
            },
            fetch: FetchConfig {
                concurrency: 4,
                retries: 1,
                request_delay_ms: 0,
                timeout_secs: 5,
            },
            transform: TransformOptions::default(),
            archive,
            stylesheet_url: None,
        }
    }

    fn temp_output_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("docpack-core-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn documents_dir(out: &Path) -> PathBuf {
        out.join("Example.docset/Contents/Resources/Documents")
    }

    /// Read back every index row in lookup order, releasing the store
    /// handle before the caller regenerates.
    async fn all_index_rows(out: &Path) -> Vec<IndexEntry> {
        let store = IndexStore::open(&out.join("Example.docset/Contents/Resources/docSet.dsidx"))
            .await
            .unwrap();
        store.lookup("").await.unwrap()
    }

    #[tokio::test]
    async fn failed_pages_are_skipped_not_fatal() {
        let server = MockServer::start().await;
        let slugs: Vec<String> = (0..10).map(|i| format!("page{i}")).collect();
        for (i, slug) in slugs.iter().enumerate() {
            match i {
                3 => {
                    Mock::given(method("GET"))
                        .and(url_path(format!("/{slug}")))
                        .respond_with(ResponseTemplate::new(404))
                        .mount(&server)
                        .await;
                }
                7 => {
                    Mock::given(method("GET"))
                        .and(url_path(format!("/{slug}")))
                        .respond_with(ResponseTemplate::new(500))
                        .mount(&server)
                        .await;
                }
                _ => mount_page(&server, slug, &page_html(slug, &["Overview"])).await,
            }
        }

        let out = temp_output_dir();
        let slug_refs: Vec<&str> = slugs.iter().map(String::as_str).collect();
        let tasks = tasks_for(&server.uri(), &slug_refs);
        let summary = generate(&tasks, &test_config(&out, false), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.pages_discovered, 10);
        assert_eq!(summary.pages_fetched, 8);
        assert_eq!(summary.pages_indexed, 8);
        assert_eq!(summary.failures.len(), 2);

        let docs = documents_dir(&out);
        assert!(docs.join("page0.html").is_file());
        assert!(!docs.join("page3.html").exists());
        assert!(!docs.join("page7.html").exists());

        std::fs::remove_dir_all(&out).ok();
    }

    #[tokio::test]
    async fn zero_tasks_fails_without_partial_output() {
        let out = temp_output_dir();
        let err = generate(&[], &test_config(&out, false), &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, DocpackError::Validation { .. }));
        assert!(!out.join("Example.docset").exists());

        std::fs::remove_dir_all(&out).ok();
    }

    #[tokio::test]
    async fn malformed_page_recorded_as_parse_failure() {
        let server = MockServer::start().await;
        mount_page(&server, "good", &page_html("Good", &["Overview"])).await;
        mount_page(&server, "binary", "%PDF-1.7 \u{1}\u{2}\u{3}").await;

        let out = temp_output_dir();
        let tasks = tasks_for(&server.uri(), &["good", "binary"]);
        let summary = generate(&tasks, &test_config(&out, false), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.pages_fetched, 2);
        assert_eq!(summary.pages_indexed, 1);
        assert_eq!(summary.failures.len(), 1);
        assert!(summary.failures[0].reason.contains("parse error"));
        assert!(!documents_dir(&out).join("binary.html").exists());

        std::fs::remove_dir_all(&out).ok();
    }

    #[tokio::test]
    async fn rerun_replaces_previous_bundle() {
        let server = MockServer::start().await;
        mount_page(&server, "alpha", &page_html("Alpha", &["One"])).await;
        mount_page(&server, "beta", &page_html("Beta", &["Two"])).await;

        let out = temp_output_dir();
        let config = test_config(&out, false);

        let tasks = tasks_for(&server.uri(), &["alpha", "beta"]);
        let first = generate(&tasks, &config, &SilentProgress).await.unwrap();

        // Second run drops beta; its page and rows must disappear.
        let tasks = tasks_for(&server.uri(), &["alpha"]);
        let second = generate(&tasks, &config, &SilentProgress).await.unwrap();

        assert_eq!(first.pages_indexed, 2);
        assert_eq!(second.pages_indexed, 1);
        assert!(documents_dir(&out).join("alpha.html").is_file());
        assert!(!documents_dir(&out).join("beta.html").exists());

        let store = IndexStore::open(&out.join("Example.docset/Contents/Resources/docSet.dsidx"))
            .await
            .unwrap();
        assert!(store.lookup("Two").await.unwrap().is_empty());

        std::fs::remove_dir_all(&out).ok();
    }

    #[tokio::test]
    async fn rerun_is_deterministic() {
        let server = MockServer::start().await;
        mount_page(&server, "alpha", &page_html("Alpha", &["One", "class Foo"])).await;
        mount_page(&server, "beta", &page_html("Beta", &["One", "send()"])).await;

        let out = temp_output_dir();
        let config = test_config(&out, false);
        let tasks = tasks_for(&server.uri(), &["alpha", "beta"]);

        let first = generate(&tasks, &config, &SilentProgress).await.unwrap();
        let html_first =
            std::fs::read_to_string(documents_dir(&out).join("alpha.html")).unwrap();
        let rows_first = all_index_rows(&out).await;

        let second = generate(&tasks, &config, &SilentProgress).await.unwrap();
        let html_second =
            std::fs::read_to_string(documents_dir(&out).join("alpha.html")).unwrap();
        let rows_second = all_index_rows(&out).await;

        assert_eq!(first.pages_indexed, second.pages_indexed);
        assert_eq!(first.entries_indexed, second.entries_indexed);
        assert_eq!(html_first, html_second);
        // The full row sequence, not just the counts, must reproduce.
        assert!(!rows_first.is_empty());
        assert_eq!(rows_first, rows_second);

        std::fs::remove_dir_all(&out).ok();
    }

    #[tokio::test]
    async fn guide_only_page_is_indexed() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "changelog",
            "<html><head><title>Changelog | Docs</title></head>\
             <body><main><p>No headings.</p></main></body></html>",
        )
        .await;

        let out = temp_output_dir();
        let tasks = tasks_for(&server.uri(), &["changelog"]);
        let summary = generate(&tasks, &test_config(&out, false), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.entries_indexed, 1);

        let store = IndexStore::open(&out.join("Example.docset/Contents/Resources/docSet.dsidx"))
            .await
            .unwrap();
        let results = store.lookup("Changelog").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].location(), "changelog.html");

        std::fs::remove_dir_all(&out).ok();
    }

    #[tokio::test]
    async fn same_heading_on_two_pages_yields_two_rows() {
        let server = MockServer::start().await;
        mount_page(&server, "a", &page_html("A", &["Overview"])).await;
        mount_page(&server, "b", &page_html("B", &["Overview"])).await;

        let out = temp_output_dir();
        let tasks = tasks_for(&server.uri(), &["a", "b"]);
        generate(&tasks, &test_config(&out, false), &SilentProgress)
            .await
            .unwrap();

        let store = IndexStore::open(&out.join("Example.docset/Contents/Resources/docSet.dsidx"))
            .await
            .unwrap();
        let results = store.lookup("Overview").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_ne!(results[0].location(), results[1].location());

        std::fs::remove_dir_all(&out).ok();
    }

    #[tokio::test]
    async fn archive_produced_when_enabled() {
        let server = MockServer::start().await;
        mount_page(&server, "index", &page_html("Index", &["Overview"])).await;

        let out = temp_output_dir();
        let tasks = tasks_for(&server.uri(), &["index"]);
        let summary = generate(&tasks, &test_config(&out, true), &SilentProgress)
            .await
            .unwrap();

        let archive = summary.archive_path.expect("archive path");
        assert!(Path::new(&archive).is_file());
        assert!(archive.ends_with("Example.tgz"));

        std::fs::remove_dir_all(&out).ok();
    }

    #[tokio::test]
    async fn stylesheet_fetched_and_linked() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "index",
            &format!(
                "<html><head><title>Index | Docs</title>\
                 <link rel=\"stylesheet\" href=\"{}/assets/site.css\"></head>\
                 <body><main><h1>Index</h1></main></body></html>",
                server.uri()
            ),
        )
        .await;
        Mock::given(method("GET"))
            .and(url_path("/assets/site.css"))
            .respond_with(ResponseTemplate::new(200).set_body_string("body { margin: 0 }"))
            .mount(&server)
            .await;

        let out = temp_output_dir();
        let mut config = test_config(&out, false);
        config.stylesheet_url =
            Some(Url::parse(&format!("{}/assets/site.css", server.uri())).unwrap());

        let tasks = tasks_for(&server.uri(), &["index"]);
        generate(&tasks, &config, &SilentProgress).await.unwrap();

        let docs = documents_dir(&out);
        assert!(docs.join("site.css").is_file());
        let html = std::fs::read_to_string(docs.join("index.html")).unwrap();
        assert!(html.contains("href=\"site.css\""));

        std::fs::remove_dir_all(&out).ok();
    }

    #[tokio::test]
    async fn missing_stylesheet_degrades_gracefully() {
        let server = MockServer::start().await;
        mount_page(&server, "index", &page_html("Index", &["Overview"])).await;

        let out = temp_output_dir();
        let mut config = test_config(&out, false);
        config.stylesheet_url =
            Some(Url::parse(&format!("{}/missing.css", server.uri())).unwrap());

        let tasks = tasks_for(&server.uri(), &["index"]);
        let summary = generate(&tasks, &config, &SilentProgress).await.unwrap();
        assert_eq!(summary.pages_indexed, 1);

        std::fs::remove_dir_all(&out).ok();
    }

    #[tokio::test]
    async fn duplicate_paths_keep_first_task() {
        let server = MockServer::start().await;
        mount_page(&server, "dup", &page_html("Dup", &["Overview"])).await;

        let out = temp_output_dir();
        let tasks = tasks_for(&server.uri(), &["dup", "dup"]);
        let summary = generate(&tasks, &test_config(&out, false), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.pages_discovered, 1);
        assert_eq!(summary.pages_indexed, 1);

        std::fs::remove_dir_all(&out).ok();
    }
}
