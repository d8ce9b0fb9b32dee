mod cli;
mod config;
mod docker;
mod error;
mod utils;

use anyhow::Result;
use clap::Parser;
use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments, then initialize logging
    let cli = Cli::parse();
    utils::logger::init(cli.verbose)?;

    cli.execute().await
}
