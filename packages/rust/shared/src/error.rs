//! Error types for docpack.
//!
//! Library crates use [`DocpackError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Two families of errors flow through the pipeline:
//! - per-page errors ([`DocpackError::Fetch`], [`DocpackError::Parse`]) are
//!   recorded in the run summary and drop only the affected page;
//! - everything else is fatal and aborts the run.

use std::path::PathBuf;

/// Classification of a failed HTTP fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// The request timed out.
    Timeout,
    /// Connection could not be established (DNS, refused, TLS).
    Connect,
    /// The server answered with a non-success status code.
    Status(u16),
    /// The fetch task itself failed to run to completion.
    Internal,
}

impl FetchErrorKind {
    /// Whether a retry may succeed. Timeouts, connection errors, rate
    /// limiting (429) and 5xx responses are transient; other 4xx responses
    /// are permanent.
    pub fn is_transient(self) -> bool {
        match self {
            Self::Timeout | Self::Connect => true,
            Self::Status(code) => code >= 500 || code == 429,
            Self::Internal => false,
        }
    }
}

impl std::fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Connect => write!(f, "connection failed"),
            Self::Status(code) => write!(f, "HTTP {code}"),
            Self::Internal => write!(f, "internal fetch failure"),
        }
    }
}

/// Top-level error type for all docpack operations.
#[derive(Debug, thiserror::Error)]
pub enum DocpackError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A page fetch failed after retries (per-page, non-fatal to the run).
    #[error("fetch error for {url}: {kind}")]
    Fetch { url: String, kind: FetchErrorKind },

    /// HTML could not be parsed into anything indexable (per-page, non-fatal).
    #[error("parse error for {page}: {message}")]
    Parse { page: String, message: String },

    /// Lookup-store error (fatal: the index cannot be created or written).
    #[error("store error: {0}")]
    Store(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Archive packaging error.
    #[error("archive error: {0}")]
    Archive(String),

    /// Data validation error (no pages discovered, index/content mismatch).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocpackError>;

impl DocpackError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error for a specific page.
    pub fn parse(page: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Parse {
            page: page.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is scoped to a single page rather than the run.
    pub fn is_page_scoped(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Parse { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = DocpackError::config("missing output dir");
        assert_eq!(err.to_string(), "config error: missing output dir");

        let err = DocpackError::parse("guide/intro.html", "no parseable content");
        assert!(err.to_string().contains("guide/intro.html"));
    }

    #[test]
    fn transient_classification() {
        assert!(FetchErrorKind::Timeout.is_transient());
        assert!(FetchErrorKind::Connect.is_transient());
        assert!(FetchErrorKind::Status(503).is_transient());
        assert!(FetchErrorKind::Status(429).is_transient());
        assert!(!FetchErrorKind::Status(404).is_transient());
        assert!(!FetchErrorKind::Status(410).is_transient());
        assert!(!FetchErrorKind::Internal.is_transient());
        assert_eq!(FetchErrorKind::Internal.to_string(), "internal fetch failure");
    }

    #[test]
    fn page_scoped_errors() {
        assert!(
            DocpackError::Fetch {
                url: "https://example.com".into(),
                kind: FetchErrorKind::Status(404),
            }
            .is_page_scoped()
        );
        assert!(DocpackError::parse("p.html", "bad").is_page_scoped());
        assert!(!DocpackError::validation("no pages").is_page_scoped());
    }
}
