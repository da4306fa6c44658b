use anyhow::Result;
use forge_translate::{cli, config::Config, server};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    cli::init()?;

    let config = Config::from_env()?;

    // Never log credentials, only enough to tell them apart
    info!(
        "Starting webhook listener: github_token={}B, openai_api_key={}B, openai_api_url={}, model={}",
        config.github_token.len(),
        config.openai_api_key.len(),
        config.openai_api_url,
        config.openai_model
    );
    info!(
        "Forwarding to {} sink(s), {} membership sink(s), secret {}",
        config.forward_urls.len(),
        config.membership_forward_urls.len(),
        if config.webhook_secret.is_some() { "required" } else { "not required" }
    );

    server::run_server(config).await
}
