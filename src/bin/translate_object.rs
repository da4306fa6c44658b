//! Translate one issue, pull request or discussion in place.
//!
//! Usage:
//!   translate-object --input https://github.com/ossrs/srs/issues/3692
//!   translate-object --input https://github.com/ossrs/srs/discussions/3700 --token ghp_xxx
//!
//! Required environment variables (or flags):
//! - GITHUB_TOKEN (--token)
//! - OPENAI_API_KEY (--key)
//!
//! Optional:
//! - OPENAI_PROXY (--proxy)
//! - OPENAI_API_URL, OPENAI_CHAT_MODEL

use anyhow::Result;
use clap::Parser;
use forge_translate::{cli, dispatch::AppContext, github::ObjectRef, orchestrator::Orchestrator};
use tracing::info;

#[derive(Parser)]
#[command(name = "translate-object", about = "Translate a forge object and its comments to English", version)]
struct Cli {
    /// URL of the issue, pull request or discussion
    #[arg(long)]
    input: String,

    #[command(flatten)]
    credentials: cli::CredentialArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    cli::init()?;
    let args = Cli::parse();

    let object = ObjectRef::parse(&args.input)?;
    let ctx = AppContext::from_config(args.credentials.load_config()?)?;
    let orchestrator = Orchestrator::new(
        ctx.forge.as_ref(),
        ctx.completer.as_ref(),
        ctx.config.openai_temperature,
    );

    let report = orchestrator.process(&object).await?;
    info!(
        "Done {}: {:?}, label {:?}, {} comment(s) updated, {} forbidden",
        object, report.state, report.label, report.comments_updated, report.comments_forbidden
    );
    println!("{}", report.title);
    Ok(())
}
