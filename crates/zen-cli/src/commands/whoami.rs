//! Whoami command implementation.

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::ConnectionArgs;
use crate::config;
use crate::output;

#[derive(Args, Debug)]
pub struct WhoamiArgs {}

pub async fn run(_args: WhoamiArgs, conn: &ConnectionArgs) -> Result<()> {
    let stored = config::load()
        .context("Failed to load config")?
        .context("No stored token. Run 'zen login' first.")?;

    output::field("URL", &config::base_url(conn, Some(&stored))?.to_string());
    output::field(
        "Token",
        if conn.token.is_some() {
            "from --token / ZEN_TOKEN"
        } else {
            "stored"
        },
    );

    Ok(())
}
