//! Legacy deposition listing.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use zen_core::DepositionQuery;

use crate::cli::ConnectionArgs;
use crate::config;
use crate::output;

#[derive(Args, Debug)]
pub struct DepositionsCommand {
    #[command(subcommand)]
    pub command: DepositionsSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum DepositionsSubcommand {
    /// List depositions, one JSON object per line
    List(ListArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Search query
    #[arg(long)]
    pub q: Option<String>,

    /// Status filter (draft, published)
    #[arg(long)]
    pub status: Option<String>,

    /// Sort order (bestmatch, -bestmatch, mostrecent, -mostrecent)
    #[arg(long)]
    pub sort: Option<String>,

    /// Page size
    #[arg(long)]
    pub size: Option<u32>,

    /// Further pages to fetch after the first (default: all)
    #[arg(long)]
    pub limit: Option<usize>,

    /// Include all versions
    #[arg(long)]
    pub all_versions: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

impl ListArgs {
    fn query(&self) -> Result<DepositionQuery> {
        let mut query = DepositionQuery::new().all_versions(self.all_versions);
        if let Some(q) = &self.q {
            query = query.q(q);
        }
        if let Some(status) = &self.status {
            query = query.status(status).context("Invalid status")?;
        }
        if let Some(sort) = &self.sort {
            query = query.sort(sort).context("Invalid sort order")?;
        }
        if let Some(size) = self.size {
            query = query.size(size);
        }
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        Ok(query)
    }
}

pub async fn handle(cmd: DepositionsCommand, conn: &ConnectionArgs) -> Result<()> {
    match cmd.command {
        DepositionsSubcommand::List(args) => list(args, conn).await,
    }
}

async fn list(args: ListArgs, conn: &ConnectionArgs) -> Result<()> {
    let query = args.query()?;
    let client = config::connect(conn)?;

    let depositions = client
        .list_depositions(&query)
        .await
        .context("Failed to list depositions")?;

    if depositions.is_empty() {
        output::note("No depositions found.");
        return Ok(());
    }

    let data: Vec<_> = depositions.iter().map(|d| d.data()).collect();
    output::items(&data, args.pretty)
}
