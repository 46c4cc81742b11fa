//! zen - CLI tool for depositing research data on Zenodo/InvenioRDM.
//!
//! A thin wrapper over `zen-core` and `zen-http`: it stores a token, drives
//! the draft lifecycle against a state file and runs listings.

mod cli;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use commands::{depositions, draft, drafts, licenses, login, records, whoami};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json_logs);

    let conn = cli.connection;
    match cli.command {
        Commands::Login(args) => login::run(args, &conn).await,
        Commands::Whoami(args) => whoami::run(args, &conn).await,
        Commands::Draft(cmd) => draft::handle(cmd, &conn).await,
        Commands::Records(cmd) => records::handle(cmd, &conn).await,
        Commands::Drafts(cmd) => drafts::handle(cmd, &conn).await,
        Commands::Depositions(cmd) => depositions::handle(cmd, &conn).await,
        Commands::Licenses(cmd) => licenses::handle(cmd, &conn).await,
    }
}

fn init_logging(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}
