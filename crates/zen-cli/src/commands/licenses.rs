//! License vocabulary commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use zen_core::LicenseQuery;

use crate::cli::ConnectionArgs;
use crate::config;
use crate::output;

#[derive(Args, Debug)]
pub struct LicensesCommand {
    #[command(subcommand)]
    pub command: LicensesSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum LicensesSubcommand {
    /// List licenses as `id  title`
    List(ListArgs),

    /// Fetch a single license as JSON
    Get(GetArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Search query
    #[arg(long)]
    pub q: Option<String>,

    /// Page size
    #[arg(long)]
    pub size: Option<u32>,

    /// Further pages to fetch after the first (default: all)
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// License id, e.g. cc-by-4.0
    pub id: String,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

pub async fn handle(cmd: LicensesCommand, conn: &ConnectionArgs) -> Result<()> {
    match cmd.command {
        LicensesSubcommand::List(args) => list(args, conn).await,
        LicensesSubcommand::Get(args) => get(args, conn).await,
    }
}

async fn list(args: ListArgs, conn: &ConnectionArgs) -> Result<()> {
    let mut query = LicenseQuery::new();
    if let Some(q) = &args.q {
        query = query.q(q);
    }
    if let Some(size) = args.size {
        query = query.size(size);
    }
    if let Some(limit) = args.limit {
        query = query.limit(limit);
    }

    let client = config::connect(conn)?;
    let licenses = client
        .list_licenses(&query)
        .await
        .context("Failed to list licenses")?;

    for license in &licenses {
        println!("{:<24} {}", license.id.bold(), license.title_text());
    }
    Ok(())
}

async fn get(args: GetArgs, conn: &ConnectionArgs) -> Result<()> {
    let client = config::connect(conn)?;
    let license = client
        .get_license(&args.id)
        .await
        .context("Failed to fetch license")?;

    if args.pretty {
        output::json_pretty(&license)
    } else {
        output::json(&license)
    }
}
