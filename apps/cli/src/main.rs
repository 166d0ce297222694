//! answerflow CLI: replay recorded answer streams.
//!
//! Feeds recorded backend responses through the normalization pipeline and
//! prints the canonical answer, for debugging backends and fixtures.

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
