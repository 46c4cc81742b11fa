//! Published record commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use zen_core::{RecordId, RepositoryItem};

use super::SearchArgs;
use crate::cli::ConnectionArgs;
use crate::config;
use crate::output;

#[derive(Args, Debug)]
pub struct RecordsCommand {
    #[command(subcommand)]
    pub command: RecordsSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum RecordsSubcommand {
    /// Search published records, one JSON object per line
    Search(SearchArgs),

    /// Fetch a single record
    Get(GetArgs),
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Record id
    pub id: String,

    /// Download all files into this directory
    #[arg(long)]
    pub download: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

pub async fn handle(cmd: RecordsCommand, conn: &ConnectionArgs) -> Result<()> {
    match cmd.command {
        RecordsSubcommand::Search(args) => search(args, conn).await,
        RecordsSubcommand::Get(args) => get(args, conn).await,
    }
}

async fn search(args: SearchArgs, conn: &ConnectionArgs) -> Result<()> {
    let query = args.query()?;
    let client = config::connect(conn)?;

    let mut pages = client
        .record_pages(&query)
        .await
        .context("Failed to search records")?;
    let mut count = 0usize;
    while let Some(page) = pages.next_page().await.context("Failed to fetch page")? {
        count += page.items().len();
        output::items(page.items(), args.pretty)?;
    }

    if count == 0 {
        output::note("No records found.");
    } else {
        output::note(&format!("{count} of {} records", pages.total()));
    }
    Ok(())
}

async fn get(args: GetArgs, conn: &ConnectionArgs) -> Result<()> {
    let id = RecordId::new(&args.id).context("Invalid record id")?;
    let client = config::connect(conn)?;

    let record = client
        .get_record(&id)
        .await
        .context("Failed to fetch record")?;

    if args.pretty {
        output::json_pretty(record.data())?;
    } else {
        output::json(record.data())?;
    }

    if let Some(dir) = &args.download {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let files = record.files().await.context("Failed to list files")?;
        for path in files
            .download_all(dir)
            .await
            .context("Failed to download files")?
        {
            output::note(&format!("saved {}", path.display()));
        }
    }
    Ok(())
}
