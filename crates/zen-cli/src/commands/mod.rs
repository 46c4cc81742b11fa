//! Subcommand implementations.

pub mod depositions;
pub mod draft;
pub mod drafts;
pub mod licenses;
pub mod login;
pub mod records;
pub mod whoami;

use anyhow::{Context, Result};
use clap::Args;

use zen_core::RecordQuery;

/// Search arguments shared by record listings.
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search query
    #[arg(long)]
    pub q: Option<String>,

    /// Sort order (bestmatch, newest, oldest, updated-desc, updated-asc, version, mostviewed, mostdownloaded)
    #[arg(long)]
    pub sort: Option<String>,

    /// Page size
    #[arg(long)]
    pub size: Option<u32>,

    /// Further pages to fetch after the first (default: all)
    #[arg(long)]
    pub limit: Option<usize>,

    /// Include all versions of each record
    #[arg(long)]
    pub all_versions: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

impl SearchArgs {
    pub fn query(&self) -> Result<RecordQuery> {
        let mut query = RecordQuery::new().all_versions(self.all_versions);
        if let Some(q) = &self.q {
            query = query.q(q);
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
