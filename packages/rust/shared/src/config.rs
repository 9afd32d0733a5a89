//! Application configuration for docpack.
//!
//! User config lives at `~/.docpack/docpack.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocpackError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docpack.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docpack";

// ---------------------------------------------------------------------------
// Config structs (matching docpack.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// HTML transform toggles.
    #[serde(default)]
    pub transform: TransformConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default bundle output directory.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Default concurrent fetch requests.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Retries per page for transient fetch failures.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Minimum ms between requests, to stay polite to the source server.
    #[serde(default = "default_request_delay")]
    pub request_delay_ms: u64,

    /// Whether to pack the finished bundle into a `.tgz` archive.
    #[serde(default = "default_true")]
    pub archive: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            concurrency: default_concurrency(),
            retries: default_retries(),
            request_delay_ms: default_request_delay(),
            archive: default_true(),
        }
    }
}

fn default_output_dir() -> String {
    ".".into()
}
fn default_concurrency() -> u32 {
    8
}
fn default_retries() -> u32 {
    2
}
fn default_request_delay() -> u64 {
    100
}

/// `[transform]` section — each rewrite step is independently toggleable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Remove navigation chrome (top bar, sidebars, TOC rail).
    #[serde(default = "default_true")]
    pub strip_chrome: bool,

    /// Inject anchor markers at structural entry points.
    #[serde(default = "default_true")]
    pub inject_anchors: bool,

    /// Rewrite intra-site links to bundle-relative paths.
    #[serde(default = "default_true")]
    pub rewrite_links: bool,

    /// Replace the CDN stylesheet reference with a bundled local copy.
    /// When off, pages keep the original reference and need network to render.
    #[serde(default)]
    pub bundle_stylesheet: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            strip_chrome: true,
            inject_anchors: true,
            rewrite_links: true,
            bundle_stylesheet: false,
        }
    }
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docpack/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DocpackError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docpack/docpack.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocpackError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DocpackError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocpackError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocpackError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocpackError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("output_dir"));
        assert!(toml_str.contains("concurrency"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.concurrency, 8);
        assert_eq!(parsed.defaults.retries, 2);
        assert!(parsed.transform.strip_chrome);
        assert!(!parsed.transform.bundle_stylesheet);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
concurrency = 2

[transform]
rewrite_links = false
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.concurrency, 2);
        assert_eq!(config.defaults.retries, 2);
        assert!(!config.transform.rewrite_links);
        assert!(config.transform.inject_anchors);
    }
}
