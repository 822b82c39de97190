mod commands;
mod config;
mod import;
mod main_lib;

use clap::Parser;
use commands::Cli;
use config::Config;
use main_lib::{build_state, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(config.log_format);
    let state = build_state(&config).await?;

    commands::run(cli.command, &state).await
}
