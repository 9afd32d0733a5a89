//! Concurrent page fetcher with bounded parallelism and per-request
//! failure isolation.
//!
//! Given an ordered list of [`PageTask`]s, [`PageFetcher::fetch_all`] returns
//! one [`FetchResult`] per task, in task order, regardless of completion
//! order. A slow or failing request never blocks independent requests, and a
//! failure never aborts the run; it becomes a failure record for the summary.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

use docpack_shared::{DocpackError, FetchErrorKind, FetchFailure, FetchResult, PageTask, Result};

/// User-Agent string for fetch requests.
const USER_AGENT: &str = concat!("docpack/", env!("CARGO_PKG_VERSION"));

/// Base delay for retry backoff; doubled per attempt.
const RETRY_BACKOFF_MS: u64 = 250;

// ---------------------------------------------------------------------------
// FetchConfig
// ---------------------------------------------------------------------------

/// Runtime fetch configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Maximum concurrent requests in flight (clamped to at least 1).
    pub concurrency: u32,
    /// Retries per task for transient failures (timeouts, 429, 5xx).
    pub retries: u32,
    /// Minimum ms before each request, to stay polite to the source server.
    pub request_delay_ms: u64,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            retries: 2,
            request_delay_ms: 100,
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// PageFetcher
// ---------------------------------------------------------------------------

/// Fetches documentation pages over HTTP. Network I/O only; never writes
/// to the filesystem.
pub struct PageFetcher {
    client: Client,
    config: FetchConfig,
}

impl PageFetcher {
    /// Create a fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocpackError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Fetch every task with bounded parallelism.
    ///
    /// Returns exactly one result per task, in task order. An empty task
    /// list returns an empty result list.
    pub async fn fetch_all(&self, tasks: &[PageTask]) -> Vec<FetchResult> {
        if tasks.is_empty() {
            return Vec::new();
        }

        let limit = self.config.concurrency.max(1) as usize;
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut handles = Vec::with_capacity(tasks.len());

        for task in tasks.iter().cloned() {
            let client = self.client.clone();
            let sem = semaphore.clone();
            let config = self.config.clone();

            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire().await.expect("semaphore closed");

                if config.request_delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(config.request_delay_ms)).await;
                }

                fetch_task(&client, &config, task).await
            }));
        }

        // Awaiting handles in spawn order re-associates results with their
        // originating tasks, independent of completion order.
        let mut results = Vec::with_capacity(tasks.len());
        for (handle, task) in handles.into_iter().zip(tasks.iter()) {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(url = %task.url, error = %e, "fetch task panicked");
                    results.push(FetchResult::Failed {
                        task: task.clone(),
                        error: FetchFailure {
                            url: task.url.clone(),
                            kind: FetchErrorKind::Internal,
                            attempts: 1,
                        },
                    });
                }
            }
        }
        results
    }

    /// Fetch a single auxiliary resource (e.g. a shared stylesheet).
    ///
    /// Unlike [`fetch_all`](Self::fetch_all) this propagates the failure,
    /// since the caller decides whether the resource is optional.
    pub async fn fetch_one(&self, url: &Url) -> Result<String> {
        match fetch_once(&self.client, url).await {
            Ok((_status, body)) => Ok(body),
            Err(kind) => Err(DocpackError::Fetch {
                url: url.to_string(),
                kind,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Request plumbing
// ---------------------------------------------------------------------------

/// Fetch one task, retrying transient failures a bounded number of times.
async fn fetch_task(client: &Client, config: &FetchConfig, task: PageTask) -> FetchResult {
    let max_attempts = config.retries + 1;
    let mut last_kind = FetchErrorKind::Connect;

    for attempt in 1..=max_attempts {
        debug!(url = %task.url, attempt, "fetching page");

        match fetch_once(client, &task.url).await {
            Ok((status, body)) => {
                return FetchResult::Fetched { task, status, body };
            }
            Err(kind) => {
                last_kind = kind;
                if kind.is_transient() && attempt < max_attempts {
                    let backoff = RETRY_BACKOFF_MS * 2u64.pow(attempt - 1);
                    warn!(
                        url = %task.url,
                        attempt,
                        error = %kind,
                        backoff_ms = backoff,
                        "transient fetch failure, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                    continue;
                }
                // Permanent failure (e.g. 404) or retries exhausted.
                warn!(url = %task.url, attempt, error = %kind, "fetch failed");
                let url = task.url.clone();
                return FetchResult::Failed {
                    task,
                    error: FetchFailure {
                        url,
                        kind,
                        attempts: attempt,
                    },
                };
            }
        }
    }

    // Loop always returns; kept for completeness.
    let url = task.url.clone();
    FetchResult::Failed {
        task,
        error: FetchFailure {
            url,
            kind: last_kind,
            attempts: max_attempts,
        },
    }
}

/// Perform a single GET, classifying any failure.
async fn fetch_once(client: &Client, url: &Url) -> std::result::Result<(u16, String), FetchErrorKind> {
    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(classify_request_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchErrorKind::Status(status.as_u16()));
    }

    let body = response.text().await.map_err(classify_request_error)?;
    Ok((status.as_u16(), body))
}

/// Map a reqwest error onto the fetch taxonomy.
fn classify_request_error(e: reqwest::Error) -> FetchErrorKind {
    if e.is_timeout() {
        FetchErrorKind::Timeout
    } else {
        FetchErrorKind::Connect
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
