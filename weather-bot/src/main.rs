//! Binary crate for the `weather-bot` Telegram bot.
//!
//! This crate focuses on:
//! - Parsing CLI arguments and interactive configuration
//! - Wiring the core coordinator to Telegram
//! - Logging setup and graceful shutdown

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod bot;
mod cli;
mod text;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cmd = cli::Cli::parse();
    cmd.run().await
}
