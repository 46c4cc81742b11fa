//! Login command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use zen_core::RecordQuery;

use crate::cli::ConnectionArgs;
use crate::config::{self, StoredConfig};
use crate::output;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Store the token without checking it against the server
    #[arg(long)]
    pub skip_verify: bool,
}

pub async fn run(args: LoginArgs, conn: &ConnectionArgs) -> Result<()> {
    let token = conn
        .token
        .clone()
        .context("No token given. Pass --token or set ZEN_TOKEN.")?;
    let base_url = config::base_url(conn, None)?;

    if !args.skip_verify {
        eprintln!("{}", "Checking token...".dimmed());
        let client = config::connect(&ConnectionArgs {
            token: Some(token.clone()),
            url: Some(base_url.to_string()),
            token_in_query: conn.token_in_query,
        })?;
        // the user's own records endpoint rejects anonymous and invalid tokens
        client
            .draft_pages(&RecordQuery::new().size(1).limit(0))
            .await
            .context("Token was rejected")?;
    }

    let path = config::save(&StoredConfig {
        url: base_url.to_string(),
        token,
    })?;

    output::success("Logged in successfully");
    println!();
    output::field("URL", &base_url.to_string());
    output::field("Config", &path.display().to_string());

    Ok(())
}
