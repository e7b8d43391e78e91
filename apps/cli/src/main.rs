//! CourseGraph operator console.
//!
//! `relabel` rewrites legacy graph labels across the source tree; `ingest`
//! parses the textbooks and loads them into the graph store and the search
//! index.

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
