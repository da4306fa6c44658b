use anyhow::{Context, Result};
use std::collections::HashMap;

pub const DEFAULT_GITHUB_GRAPHQL_URL: &str = "https://api.github.com/graphql";
pub const DEFAULT_OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4-1106-preview";

/// Prefix of the environment variables mapping a forge login to a
/// `Name <email>` identity, e.g. `USER_octo_cat='Octo <octo@example.com>'`.
pub const COAUTHOR_ENV_PREFIX: &str = "USER_";

#[derive(Debug, Clone)]
pub struct Config {
    // Forge
    pub github_token: String,
    pub github_graphql_url: String,

    // OpenAI
    pub openai_api_key: String,
    pub openai_api_url: String,
    pub openai_model: String,
    pub openai_organization: Option<String>,
    pub openai_temperature: f32,

    // Listener
    pub port: u16,
    pub webhook_secret: Option<String>,
    pub max_concurrent_deliveries: usize,

    // Forwarding
    pub forward_urls: Vec<String>,
    pub membership_forward_urls: Vec<String>,
    pub ignored_senders: Vec<String>,

    // PR refinement, keyed by lower-cased login
    pub coauthors: HashMap<String, String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_env_with_overrides(&[])
    }

    /// Environment config where the given `(variable, value)` pairs win over
    /// the environment. `None` values fall through.
    pub fn from_env_with_overrides(overrides: &[(&str, Option<String>)]) -> Result<Self> {
        let coauthors = coauthors_from_vars(std::env::vars());
        let mut config = Self::from_lookup(|key| {
            overrides
                .iter()
                .find_map(|(name, value)| (*name == key).then(|| value.clone()).flatten())
                .or_else(|| std::env::var(key).ok())
        })?;
        config.coauthors = coauthors;
        Ok(config)
    }

    /// Build a config from an arbitrary key lookup. Binaries use this to layer
    /// command-line flags over the environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let openai_api_url = match (lookup("OPENAI_API_URL"), lookup("OPENAI_PROXY")) {
            (Some(url), _) => url,
            (None, Some(proxy)) => format!("http://{}/v1/chat/completions", proxy),
            (None, None) => DEFAULT_OPENAI_API_URL.to_string(),
        };

        let forward_urls = split_list(lookup("FORWARD_URLS"));
        let membership_forward_urls = match split_list(lookup("MEMBERSHIP_FORWARD_URLS")) {
            urls if urls.is_empty() => forward_urls.clone(),
            urls => urls,
        };

        Ok(Self {
            github_token: lookup("GITHUB_TOKEN").context("GITHUB_TOKEN not set")?,
            github_graphql_url: lookup("GITHUB_GRAPHQL_URL")
                .unwrap_or_else(|| DEFAULT_GITHUB_GRAPHQL_URL.to_string()),

            openai_api_key: lookup("OPENAI_API_KEY").context("OPENAI_API_KEY not set")?,
            openai_api_url,
            openai_model: lookup("OPENAI_CHAT_MODEL")
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            openai_organization: lookup("OPENAI_ORGANIZATION"),
            openai_temperature: 0.0,

            port: lookup("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(2023),
            webhook_secret: lookup("WEBHOOK_SECRET").filter(|s| !s.is_empty()),
            max_concurrent_deliveries: lookup("MAX_CONCURRENT_DELIVERIES")
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(16),

            forward_urls,
            membership_forward_urls,
            ignored_senders: lookup("IGNORED_SENDERS")
                .map(|v| split_list(Some(v)))
                .unwrap_or_else(|| vec!["dependabot".to_string()]),

            coauthors: HashMap::new(),
        })
    }

    /// Identity line for a login, if one was configured.
    pub fn coauthor_identity(&self, login: &str) -> Option<&str> {
        self.coauthors
            .get(&coauthor_key(login))
            .map(String::as_str)
    }

    pub fn is_ignored_sender(&self, login: &str) -> bool {
        self.ignored_senders
            .iter()
            .any(|pattern| !pattern.is_empty() && login.contains(pattern.as_str()))
    }
}

/// `octo-Cat` and the env var `USER_octo_cat` share the key `octo_cat`.
pub fn coauthor_key(login: &str) -> String {
    login.to_lowercase().replace('-', "_")
}

fn coauthors_from_vars<I>(vars: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| {
            let login = key.strip_prefix(COAUTHOR_ENV_PREFIX)?;
            if login.is_empty() || value.trim().is_empty() {
                return None;
            }
            Some((coauthor_key(login), value.trim().to_string()))
        })
        .collect()
}

fn split_list(value: Option<String>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
