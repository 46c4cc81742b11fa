//! Draft lifecycle commands.
//!
//! Every subcommand works on the draft whose id is recorded in `--state`.
//! `create` makes the draft and writes the file; the others require it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use colored::Colorize;
use serde_json::Value;

use zen_core::state::read_draft_id;
use zen_core::{
    Access, Client, Draft, DraftOptions, Embargo, RepositoryItem, UploadOptions, UploadSource,
};

use crate::cli::ConnectionArgs;
use crate::config;
use crate::output;

#[derive(Args, Debug)]
pub struct DraftCommand {
    /// File pinning the draft id between runs
    #[arg(long, global = true, default_value = "zen-draft.json")]
    pub state: PathBuf,

    #[command(subcommand)]
    pub command: DraftSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum DraftSubcommand {
    /// Create a draft, or resume the one in the state file
    Create(CreateArgs),

    /// Print the draft as JSON
    Show(ShowArgs),

    /// List the draft's files
    Files,

    /// Upload files or URLs into the draft
    Upload(UploadArgs),

    /// Publish the draft
    Publish,

    /// Delete the draft and its state file
    Discard,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Record title
    #[arg(long)]
    pub title: Option<String>,

    /// JSON file with metadata fields to merge in
    #[arg(long)]
    pub metadata: Option<PathBuf>,

    /// Restrict record and files until the given date (YYYY-MM-DD)
    #[arg(long)]
    pub embargo_until: Option<NaiveDate>,

    /// Reason shown while the embargo is active
    #[arg(long, requires = "embargo_until")]
    pub embargo_reason: Option<String>,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Local paths or http(s) URLs
    #[arg(required = true)]
    pub sources: Vec<String>,

    /// Key to store the file under (single source only)
    #[arg(long)]
    pub key: Option<String>,

    /// Attempts before giving up
    #[arg(long, default_value_t = 15)]
    pub retries: u32,

    /// Lower bound of the wait between attempts, in seconds
    #[arg(long, default_value_t = 10)]
    pub min_delay: u64,

    /// Upper bound of the wait between attempts, in seconds
    #[arg(long, default_value_t = 60)]
    pub max_delay: u64,

    /// Report progress at debug level only
    #[arg(long)]
    pub quiet: bool,

    /// Directory for temporary downloads of URL sources
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Upload even when the draft already has an identical file
    #[arg(long)]
    pub force: bool,
}

pub async fn handle(cmd: DraftCommand, conn: &ConnectionArgs) -> Result<()> {
    let client = config::connect(conn)?;
    let state = cmd.state;

    match cmd.command {
        DraftSubcommand::Create(args) => create(&client, &state, args).await,
        DraftSubcommand::Show(args) => show(&client, &state, args).await,
        DraftSubcommand::Files => files(&client, &state).await,
        DraftSubcommand::Upload(args) => upload(&client, &state, args).await,
        DraftSubcommand::Publish => publish(&client, &state).await,
        DraftSubcommand::Discard => discard(&client, &state).await,
    }
}

async fn load(client: &Client, state: &Path) -> Result<Draft> {
    let id = read_draft_id(state)
        .context("Failed to read state file")?
        .with_context(|| {
            format!(
                "No draft in {}. Run 'zen draft create' first.",
                state.display()
            )
        })?;
    client.get_draft(&id).await.context("Failed to load draft")
}

async fn create(client: &Client, state: &Path, args: CreateArgs) -> Result<()> {
    let mut options = DraftOptions::default();
    if let Some(until) = args.embargo_until {
        options.access = Access::restricted(Embargo::until(until, args.embargo_reason));
    }

    let mut draft = client
        .load_or_create_draft(state, options)
        .await
        .context("Failed to create draft")?;

    let mut changed = false;
    if let Some(title) = args.title {
        draft.metadata_mut().insert("title".into(), Value::String(title));
        changed = true;
    }
    if let Some(path) = &args.metadata {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let fields: serde_json::Map<String, Value> =
            serde_json::from_str(&raw).context("Metadata file must hold a JSON object")?;
        draft.metadata_mut().extend(fields);
        changed = true;
    }
    if changed {
        draft.update(&[]).await.context("Failed to update draft")?;
    }

    draft.save_json(state).context("Failed to write state file")?;

    output::success("Draft ready");
    println!();
    print_summary(&draft);
    output::field("State", &state.display().to_string());
    Ok(())
}

async fn show(client: &Client, state: &Path, args: ShowArgs) -> Result<()> {
    let draft = load(client, state).await?;
    if args.pretty {
        output::json_pretty(draft.data())
    } else {
        output::json(draft.data())
    }
}

async fn files(client: &Client, state: &Path) -> Result<()> {
    let draft = load(client, state).await?;
    let files = draft.files();

    if files.entries().is_empty() {
        output::note("No files.");
        return Ok(());
    }

    for entry in files.entries() {
        let status = if entry.is_committed() {
            "committed".green()
        } else {
            "pending".yellow()
        };
        let size = entry.size.map(output::size).unwrap_or_else(|| "-".into());
        println!("{:<10} {:>10}  {}", status, size, entry.key);
    }
    eprintln!();
    output::field("Total", &output::size(files.total_size()));
    Ok(())
}

async fn upload(client: &Client, state: &Path, args: UploadArgs) -> Result<()> {
    if args.key.is_some() && args.sources.len() > 1 {
        bail!("--key can only be used with a single source");
    }

    let mut options = UploadOptions::default()
        .with_retries(args.retries)
        .with_delays(
            Duration::from_secs(args.min_delay),
            Duration::from_secs(args.max_delay),
        )
        .quiet(args.quiet)
        .force(args.force);
    if let Some(key) = &args.key {
        options = options.with_key(key);
    }
    if let Some(dir) = &args.work_dir {
        options = options.with_work_dir(dir);
    }
    options.validate().context("Invalid upload options")?;

    // parse everything before touching the server
    let sources = args
        .sources
        .iter()
        .map(|s| UploadSource::parse(s).with_context(|| format!("Invalid source: {s}")))
        .collect::<Result<Vec<_>>>()?;

    let mut draft = load(client, state).await?;
    for source in sources {
        let label = source.to_string();
        let outcome = draft
            .upload(source, options.clone())
            .await
            .with_context(|| format!("Failed to upload {label}"))?;
        if outcome.is_skipped() {
            output::note(&format!("{} unchanged, skipped", outcome.entry.key));
            continue;
        }
        if outcome.attempts > 1 {
            output::warning(&format!(
                "{} needed {} attempts",
                outcome.entry.key, outcome.attempts
            ));
        }
        output::success(&format!("Uploaded {}", outcome.entry.key));
    }

    draft.save_json(state).context("Failed to write state file")?;
    Ok(())
}

async fn publish(client: &Client, state: &Path) -> Result<()> {
    let draft = load(client, state).await?;
    if draft.files().entries().iter().any(|e| !e.is_committed()) {
        output::warning("Draft has uncommitted files");
    }

    let record = draft.publish().await.context("Failed to publish draft")?;
    record.save_json(state).context("Failed to write state file")?;

    output::success("Published");
    println!();
    output::field("ID", record.id().as_str());
    if let Some(doi) = record.doi() {
        output::field("DOI", doi);
    }
    if let Some(html) = &record.links().self_html {
        output::field("URL", html);
    }
    Ok(())
}

async fn discard(client: &Client, state: &Path) -> Result<()> {
    let draft = load(client, state).await?;
    let id = draft.id().clone();
    draft.delete().await.context("Failed to delete draft")?;

    std::fs::remove_file(state).context("Failed to remove state file")?;

    output::success(&format!("Draft {id} discarded"));
    Ok(())
}

fn print_summary(draft: &Draft) {
    output::field("ID", draft.id().as_str());
    output::field("Title", draft.title().unwrap_or("(untitled)"));
    if let Some(doi) = draft.doi() {
        output::field("DOI", doi);
    }
    if draft.is_editing() {
        output::field("Mode", "editing a published record");
    }
}
