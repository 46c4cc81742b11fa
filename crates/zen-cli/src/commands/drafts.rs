//! Listing of the caller's own drafts and records.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use zen_core::RepositoryItem;

use super::SearchArgs;
use crate::cli::ConnectionArgs;
use crate::config;
use crate::output;

#[derive(Args, Debug)]
pub struct DraftsCommand {
    #[command(subcommand)]
    pub command: DraftsSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum DraftsSubcommand {
    /// List drafts, one JSON object per line
    List(SearchArgs),
}

pub async fn handle(cmd: DraftsCommand, conn: &ConnectionArgs) -> Result<()> {
    match cmd.command {
        DraftsSubcommand::List(args) => list(args, conn).await,
    }
}

async fn list(args: SearchArgs, conn: &ConnectionArgs) -> Result<()> {
    let query = args.query()?;
    let client = config::connect(conn)?;

    let drafts = client
        .list_drafts(&query)
        .await
        .context("Failed to list drafts")?;

    if drafts.is_empty() {
        output::note("No drafts found.");
        return Ok(());
    }

    let data: Vec<_> = drafts.iter().map(|d| d.data()).collect();
    output::items(&data, args.pretty)
}
