//! Pull request title/body refinement.
//!
//! Unlike translation this rewrites the whole title or body in one call, after
//! setting aside the parts that must survive verbatim: the version suffix of
//! release titles and the metadata blocks after the body delimiter.

use crate::completion::Completer;
use crate::config::{coauthor_key, Config, COAUTHOR_ENV_PREFIX};
use crate::github::{Forge, ObjectRef, PullRequestInfo, GHOST_LOGIN};
use crate::marker::{self, LABEL_REFINED, PR_METADATA_DELIMITER};
use crate::translate::TranslationEngine;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Separates a release title from its version, e.g. `Fix bug. v5.0.100`.
pub const VERSION_DELIMITER: &str = ". v";

const COAUTHOR_MARKER: &str = "Co-authored-by";

static VERSION_REGEX: OnceLock<Regex> = OnceLock::new();

/// Normalise a release version given on the command line: `v5.0.100` and
/// `5.0.100` both yield `5.0.100`.
pub fn parse_version(input: &str) -> Result<String> {
    let regex = VERSION_REGEX
        .get_or_init(|| Regex::new(r"^[vV]?(\d+(?:\.\d+)*)$").expect("valid version pattern"));
    match regex.captures(input.trim()) {
        Some(caps) => Ok(caps[1].to_string()),
        None => bail!("Invalid version '{}', expected e.g. v5.0.100", input),
    }
}

/// Split `Fix bug. v5.0.100` into `("Fix bug", Some("5.0.100"))`.
pub fn split_title_version(title: &str) -> (&str, Option<&str>) {
    match title.split_once(VERSION_DELIMITER) {
        Some((base, version)) => (base, Some(version)),
        None => (title, None),
    }
}

/// Inverse of [`split_title_version`]. Trailing periods of `base` are dropped
/// before the suffix is attached.
pub fn join_title_version(base: &str, version: Option<&str>) -> String {
    match version {
        Some(version) => format!(
            "{}{}{}",
            base.trim_matches('.'),
            VERSION_DELIMITER,
            version
        ),
        None => base.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionedBody {
    /// Free text to refine.
    pub text: String,
    /// Blocks carrying the sentinel, trimmed, in original order.
    pub metadata: Vec<String>,
}

/// Set aside the metadata blocks of a PR body. Co-author blocks are dropped;
/// they are recomputed from the participants.
pub fn partition_body(body: &str) -> PartitionedBody {
    if !body.contains(PR_METADATA_DELIMITER) {
        return PartitionedBody {
            text: body.to_string(),
            metadata: Vec::new(),
        };
    }

    let mut text_segments = Vec::new();
    let mut metadata = Vec::new();
    for segment in body.split(PR_METADATA_DELIMITER) {
        if marker::detect(segment) {
            metadata.push(segment.trim().to_string());
        } else if !segment.contains(COAUTHOR_MARKER) {
            text_segments.push(segment);
        }
    }

    PartitionedBody {
        text: text_segments.join(PR_METADATA_DELIMITER),
        metadata,
    }
}

/// `Co-authored-by:` lines for every participant except the author.
pub fn coauthor_lines(pr: &PullRequestInfo, config: &Config) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for login in &pr.participants {
        if login == GHOST_LOGIN || *login == pr.author {
            continue;
        }
        match config.coauthor_identity(login) {
            Some(identity) => {
                let line = format!("{}: {}", COAUTHOR_MARKER, identity);
                if !lines.contains(&line) {
                    lines.push(line);
                }
            }
            None => warn!(
                "{}{} is not set, skipping co-author {}",
                COAUTHOR_ENV_PREFIX,
                coauthor_key(login),
                login
            ),
        }
    }
    lines
}

/// Refined text followed by each metadata block and the co-author block, each
/// after the body delimiter.
pub fn assemble_body(text: &str, metadata: &[String], coauthors: &[String]) -> String {
    let mut body = text.to_string();
    for block in metadata {
        append_block(&mut body, block);
    }
    if !coauthors.is_empty() {
        append_block(&mut body, &coauthors.join("\n"));
    }
    body
}

fn append_block(body: &mut String, block: &str) {
    body.push_str(marker::BLOCK_SEPARATOR);
    body.push_str(PR_METADATA_DELIMITER);
    body.push_str(marker::BLOCK_SEPARATOR);
    body.push_str(block);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefineOptions {
    pub title: bool,
    pub body: bool,
    /// Replaces the title's version suffix, with or without a leading `v`.
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefineReport {
    pub title: String,
    pub body: String,
    pub updated: bool,
}

pub struct PrRefiner<'a> {
    forge: &'a dyn Forge,
    engine: TranslationEngine<'a>,
    config: &'a Config,
}

impl<'a> PrRefiner<'a> {
    pub fn new(forge: &'a dyn Forge, completer: &'a dyn Completer, config: &'a Config) -> Self {
        Self {
            forge,
            engine: TranslationEngine::new(completer, config.openai_temperature),
            config,
        }
    }

    pub async fn refine(&self, object: &ObjectRef, options: &RefineOptions) -> Result<RefineReport> {
        if !options.title && !options.body && options.version.is_none() {
            bail!("Nothing to refine: select the title, the body or a version");
        }
        let version = options.version.as_deref().map(parse_version).transpose()?;

        let pr = self
            .forge
            .fetch_pull_request(object)
            .await
            .with_context(|| format!("Failed to fetch {}", object))?;

        info!(
            "Refining {} by {} (base: {}, head: {}, mergeable: {})",
            object,
            pr.author,
            pr.base_ref.as_deref().unwrap_or("-"),
            pr.head_ref.as_deref().unwrap_or("-"),
            pr.mergeable
        );

        let (base_title, suffix) = split_title_version(&pr.title);
        let suffix = version.as_deref().or(suffix);

        let title = if options.title {
            let refined = self
                .engine
                .refine(base_title)
                .await
                .context("Failed to refine title")?;
            join_title_version(&refined, suffix)
        } else if options.version.is_some() {
            join_title_version(base_title, suffix)
        } else {
            pr.title.clone()
        };

        let body = if options.body {
            let parts = partition_body(&pr.body);
            let text = parts.text.trim();
            let refined = if text.is_empty() {
                String::new()
            } else {
                self.engine
                    .refine(text)
                    .await
                    .context("Failed to refine body")?
            };
            assemble_body(&refined, &parts.metadata, &coauthor_lines(&pr, self.config))
        } else {
            pr.body.clone()
        };

        let updated = title != pr.title || body != pr.body;
        if updated {
            self.forge
                .update_object(object.kind, &pr.id, &title, &body)
                .await
                .with_context(|| format!("Failed to update {}", object))?;
            info!("Updated {}: {}", object, title);
        } else {
            info!("{} is unchanged", object);
        }

        let label_id = self
            .forge
            .label_id(&object.repo, LABEL_REFINED)
            .await
            .with_context(|| format!("Failed to resolve label {}", LABEL_REFINED))?;
        self.forge
            .add_label(&pr.id, &label_id)
            .await
            .with_context(|| format!("Failed to label {}", object))?;

        Ok(RefineReport {
            title,
            body,
            updated,
        })
    }
}
