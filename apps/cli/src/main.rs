//! mwkb CLI — documentation knowledge-base service.
//!
//! Crawls documentation sites into a persistent hybrid-search index and
//! exposes the knowledge-base tools over a line-oriented transport.

mod commands;
mod serve;

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
