//! CLI argument definitions.

use clap::{Args, Parser, Subcommand};

use crate::commands::{depositions, draft, drafts, licenses, login, records, whoami};

/// Zenodo/InvenioRDM deposit tool.
#[derive(Parser, Debug)]
#[command(name = "zen")]
#[command(author, version = env!("ZEN_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides for the stored configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Personal access token
    #[arg(long, env = "ZEN_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Instance base URL, e.g. https://sandbox.zenodo.org
    #[arg(long, env = "ZEN_URL", global = true)]
    pub url: Option<String>,

    /// Send the token as an `access_token` query parameter instead of a header
    #[arg(long, global = true)]
    pub token_in_query: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store an access token and instance URL
    Login(login::LoginArgs),

    /// Display the stored configuration
    Whoami(whoami::WhoamiArgs),

    /// Work with the draft pinned by a state file
    Draft(draft::DraftCommand),

    /// Search and fetch published records
    Records(records::RecordsCommand),

    /// List your drafts and records
    Drafts(drafts::DraftsCommand),

    /// Legacy deposition listings
    Depositions(depositions::DepositionsCommand),

    /// Browse the license vocabulary
    Licenses(licenses::LicensesCommand),
}
