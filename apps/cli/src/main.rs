//! siterag CLI — crawl a site into a versioned retrieval index.
//!
//! Crawls a website breadth-first, persists the page text partitioned by a
//! per-run index identifier, embeds it into a vector index, and manages
//! which index answers retrieval queries.

mod commands;

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
