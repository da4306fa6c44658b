//! Rewrite a pull request title and/or body into polished English, keeping
//! release version suffixes and metadata blocks, and credit co-authors.
//!
//! Usage:
//!   refine-pr --input https://github.com/ossrs/srs/pull/3699 --title --body
//!   refine-pr --input https://github.com/ossrs/srs/pull/3699 --version v6.0.48
//!
//! Co-author identities come from `USER_<login>` variables, e.g.
//! `USER_octo_cat='Octo Cat <octo@example.com>'`.

use anyhow::{bail, Result};
use clap::Parser;
use forge_translate::{
    cli,
    dispatch::AppContext,
    github::{ObjectKind, ObjectRef},
    refine::{PrRefiner, RefineOptions},
};
use tracing::info;

#[derive(Parser)]
#[command(name = "refine-pr", about = "Refine a pull request title and body with AI", version)]
struct Cli {
    /// Pull request URL
    #[arg(long)]
    input: String,

    /// Refine the title
    #[arg(long)]
    title: bool,

    /// Refine the body
    #[arg(long)]
    body: bool,

    /// Replace the version suffix of the title, e.g. v6.0.48
    #[arg(long)]
    version: Option<String>,

    #[command(flatten)]
    credentials: cli::CredentialArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    cli::init()?;
    let args = Cli::parse();

    if !args.title && !args.body && args.version.is_none() {
        bail!("Nothing to do: pass --title, --body or --version");
    }

    let object = ObjectRef::parse(&args.input)?;
    if object.kind != ObjectKind::PullRequest {
        bail!("{} is not a pull request", args.input);
    }

    let config = args.credentials.load_config()?;
    let ctx = AppContext::from_config(config)?;
    let refiner = PrRefiner::new(ctx.forge.as_ref(), ctx.completer.as_ref(), &ctx.config);

    let options = RefineOptions {
        title: args.title,
        body: args.body,
        version: args.version,
    };
    let report = refiner.refine(&object, &options).await?;

    info!(
        "{} {}",
        object,
        if report.updated { "updated" } else { "unchanged" }
    );
    println!("{}", report.title);
    Ok(())
}
