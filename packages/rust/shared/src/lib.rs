//! Shared types, error model, and configuration for docpack.
//!
//! This crate is the foundation depended on by all other docpack crates.
//! It provides:
//! - [`DocpackError`] — the unified error type
//! - Domain types ([`PageTask`], [`FetchResult`], [`IndexEntry`], [`BundleMeta`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, TransformConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from,
};
pub use error::{DocpackError, FetchErrorKind, Result};
pub use types::{
    BundleMeta, EntryKind, FetchFailure, FetchResult, IndexEntry, PageFailure, PageTask,
    RunSummary, Stage, TransformedPage, url_to_slug,
};
