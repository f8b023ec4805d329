use anyhow::Context;
use clap::Parser;
use tracing::debug;

mod cli;
mod config;
mod server;
mod storage;
mod utils;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let config = cli.load_config();
    utils::log::init(&config);
    debug!("reelbox {} with {config:?}", env!("REELBOX_VERSION"));

    cli.run(&config).await.context("reelbox failed")
}
