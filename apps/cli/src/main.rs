//! docpack CLI — offline documentation bundle generator.
//!
//! Captures a set of documentation pages, rewrites them for offline
//! viewing, and packages them with a typed lookup index into a `.docset`
//! bundle.

mod commands;
mod manifest;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
