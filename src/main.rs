mod blockers;
mod cli;
mod config;
mod error;
mod jenkins;
mod output;
mod remind;
mod report;
mod trackers;
mod version;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting Valet - Jenkins CI report generator");
    cli.execute().await?;

    Ok(())
}
