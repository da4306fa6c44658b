//! Pieces shared by the one-shot binaries.

use crate::config::Config;
use anyhow::Result;
use clap::Args;
use tracing::info;

/// Credentials that may be passed on the command line instead of the
/// environment.
#[derive(Debug, Clone, Default, Args)]
pub struct CredentialArgs {
    /// Forge access token (GITHUB_TOKEN)
    #[arg(long)]
    pub token: Option<String>,

    /// OpenAI API key (OPENAI_API_KEY)
    #[arg(long)]
    pub key: Option<String>,

    /// OpenAI proxy host[:port], e.g. `127.0.0.1:8080` (OPENAI_PROXY)
    #[arg(long)]
    pub proxy: Option<String>,
}

impl CredentialArgs {
    /// Environment config with the flags layered on top.
    pub fn load_config(&self) -> Result<Config> {
        let config = Config::from_env_with_overrides(&[
            ("GITHUB_TOKEN", self.token.clone()),
            ("OPENAI_API_KEY", self.key.clone()),
            ("OPENAI_PROXY", self.proxy.clone()),
        ])?;

        info!(
            "github_token={}B, openai_api_key={}B, openai_api_url={}",
            config.github_token.len(),
            config.openai_api_key.len(),
            config.openai_api_url
        );
        Ok(config)
    }
}

/// Load `.env` and install the log subscriber.
pub fn init() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("forge_translate=info".parse()?),
        )
        .init();
    Ok(())
}
