//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use docpack_core::pipeline::{GenerateConfig, ProgressReporter, generate};
use docpack_fetch::FetchConfig;
use docpack_index::IndexStore;
use docpack_shared::{RunSummary, init_config, load_config};
use docpack_transform::TransformOptions;

use crate::manifest::Manifest;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docpack — package documentation sites into offline `.docset` bundles.
#[derive(Parser)]
#[command(
    name = "docpack",
    version,
    about = "Capture documentation pages into an offline, searchable .docset bundle.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Generate a docset bundle from a page manifest.
    Generate {
        /// Path to the TOML page manifest.
        manifest: PathBuf,

        /// Output directory for the bundle (defaults to config value).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Maximum concurrent fetches (defaults to config value).
        #[arg(short, long)]
        concurrency: Option<u32>,

        /// Skip the .tgz archive step.
        #[arg(long)]
        no_archive: bool,

        /// Bundle the manifest's shared stylesheet locally, even if the
        /// config leaves it off.
        #[arg(long)]
        bundle_stylesheet: bool,

        /// Print the run summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Query a generated bundle's lookup index.
    Lookup {
        /// Path to the .docset directory.
        docset: PathBuf,

        /// Case-insensitive name prefix to search for.
        prefix: String,

        /// Maximum number of results to print.
        #[arg(long, default_value = "25")]
        limit: usize,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docpack=info",
        1 => "docpack=debug",
        _ => "docpack=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate {
            manifest,
            out,
            concurrency,
            no_archive,
            bundle_stylesheet,
            json,
        } => cmd_generate(&manifest, out, concurrency, no_archive, bundle_stylesheet, json).await,
        Command::Lookup {
            docset,
            prefix,
            limit,
        } => cmd_lookup(&docset, &prefix, limit).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_generate(
    manifest_path: &PathBuf,
    out: Option<PathBuf>,
    concurrency: Option<u32>,
    no_archive: bool,
    bundle_stylesheet: bool,
    json: bool,
) -> Result<()> {
    let config = load_config()?;
    let manifest = Manifest::load(manifest_path)?;
    let tasks = manifest.tasks();

    let output_dir = out.unwrap_or_else(|| PathBuf::from(&config.defaults.output_dir));

    let stylesheet_url = if bundle_stylesheet || config.transform.bundle_stylesheet {
        manifest.docset.stylesheet.clone()
    } else {
        None
    };

    let generate_config = GenerateConfig {
        output_dir,
        meta: manifest.docset.meta.clone(),
        fetch: FetchConfig {
            concurrency: concurrency.unwrap_or(config.defaults.concurrency),
            retries: config.defaults.retries,
            request_delay_ms: config.defaults.request_delay_ms,
            ..FetchConfig::default()
        },
        transform: TransformOptions::from(&config.transform),
        archive: !no_archive && config.defaults.archive,
        stylesheet_url,
    };

    info!(
        manifest = %manifest_path.display(),
        bundle = %generate_config.meta.name,
        pages = tasks.len(),
        "generating docset"
    );

    let reporter = CliProgress::new();
    let summary = generate(&tasks, &generate_config, &reporter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    println!("  Docset generated!");
    println!("  Bundle:   {}.docset", generate_config.meta.name);
    println!(
        "  Pages:    {} indexed / {} discovered",
        summary.pages_indexed, summary.pages_discovered
    );
    println!("  Entries:  {}", summary.entries_indexed);
    if let Some(archive) = &summary.archive_path {
        println!("  Archive:  {archive}");
    }
    if !summary.failures.is_empty() {
        println!("  Failures: {}", summary.failures.len());
        for failure in &summary.failures {
            println!("    {} — {}", failure.url, failure.reason);
        }
    }
    println!("  Time:     {:.1}s", summary.elapsed_ms as f64 / 1000.0);
    println!();

    Ok(())
}

async fn cmd_lookup(docset: &PathBuf, prefix: &str, limit: usize) -> Result<()> {
    let index_path = docset.join("Contents/Resources/docSet.dsidx");
    let store = IndexStore::open(&index_path).await?;

    let entries = store.lookup(prefix).await?;
    if entries.is_empty() {
        println!("no entries match '{prefix}'");
        return Ok(());
    }

    for entry in entries.iter().take(limit) {
        println!(
            "{:<10} {:<40} {}",
            entry.kind.as_str(),
            entry.name,
            entry.location()
        );
    }
    if entries.len() > limit {
        println!("... and {} more", entries.len() - limit);
    }

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("wrote default config to {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let rendered = toml::to_string_pretty(&config).map_err(|e| eyre!("{e}"))?;
    print!("{rendered}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn page_fetched(&self, url: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Fetching [{current}/{total}] {url}"));
    }

    fn page_processed(&self, path: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Indexing [{current}/{total}] {path}"));
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}
