//! Translate the most commented objects of a repository that are not yet
//! labelled as translated or English-native.
//!
//! Usage:
//!   batch-translate --input https://github.com/ossrs/srs --filter issue --count 10
//!   batch-translate --input https://github.com/ossrs/srs --filter discussion
//!
//! Required environment variables (or flags):
//! - GITHUB_TOKEN (--token)
//! - OPENAI_API_KEY (--key)

use anyhow::{bail, Result};
use clap::Parser;
use forge_translate::{
    cli,
    dispatch::AppContext,
    github::{ObjectKind, RepoRef, MAX_PAGE_ITEMS},
    orchestrator::Orchestrator,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "batch-translate", about = "Translate a batch of forge objects found by search", version)]
struct Cli {
    /// Repository URL, e.g. https://github.com/ossrs/srs
    #[arg(long)]
    input: String,

    /// Object kind: issue, pr or discussion
    #[arg(long, default_value = "issue")]
    filter: ObjectKind,

    /// Number of objects to process
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=MAX_PAGE_ITEMS as i64))]
    count: u32,

    #[command(flatten)]
    credentials: cli::CredentialArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    cli::init()?;
    let args = Cli::parse();

    let repo = RepoRef::parse(&args.input)?;
    let ctx = AppContext::from_config(args.credentials.load_config()?)?;

    let orchestrator = Orchestrator::new(
        ctx.forge.as_ref(),
        ctx.completer.as_ref(),
        ctx.config.openai_temperature,
    );

    let report = orchestrator.process_batch(&repo, args.filter, args.count).await?;
    if !report.failed.is_empty() {
        bail!(
            "{} of {} object(s) failed: {}",
            report.failed.len(),
            report.found,
            report.failed.join(", ")
        );
    }
    info!("Batch complete: {} object(s)", report.processed);
    Ok(())
}
