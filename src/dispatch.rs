//! Per-delivery worker logic and the bounded task pool running it.
//!
//! The listener hands each accepted delivery to [`Dispatcher::dispatch`] and
//! answers the sender right away. Workers are tokio tasks tracked in a
//! `JoinSet`, at most `max_concurrent_deliveries` of them doing work at once.
//! A failing worker is logged and never reaches the listener.

use crate::completion::{Completer, OpenAiClient};
use crate::config::Config;
use crate::events::{self, Event};
use crate::forward::{ForwardSummary, Forwarder};
use crate::github::{Forge, GitHubClient};
use crate::orchestrator::Orchestrator;
use anyhow::{Context, Result};
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Everything a worker needs, built once at startup.
pub struct AppContext {
    pub config: Arc<Config>,
    pub forge: Arc<dyn Forge>,
    pub completer: Arc<dyn Completer>,
    pub forwarder: Forwarder,
}

impl AppContext {
    pub fn from_config(config: Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            forge: Arc::new(GitHubClient::new(client.clone(), &config)),
            completer: Arc::new(OpenAiClient::new(client.clone(), &config)),
            forwarder: Forwarder::new(client),
            config: Arc::new(config),
        })
    }
}

/// One inbound webhook delivery.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub id: String,
    /// Forge event header; absent for membership deliveries.
    pub event: Option<String>,
    pub headers: HeaderMap,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Ping; nothing to do.
    Acknowledged,
    /// Sender is on the ignore list.
    Ignored,
    Forwarded(ForwardSummary),
    /// Handled, but no sinks are configured.
    NotForwarded,
}

/// Classify, translate and forward one delivery.
pub async fn handle_delivery(ctx: &AppContext, delivery: Delivery) -> DeliveryOutcome {
    let Delivery {
        id,
        event,
        headers,
        mut payload,
        received_at,
    } = delivery;

    let classified = match Event::classify(event.as_deref(), &payload) {
        Ok(classified) => classified,
        Err(e) => {
            warn!("{}: {}, forwarding as is", id, e);
            Event::Other {
                event: event.clone().unwrap_or_default(),
                action: None,
            }
        }
    };
    info!("{}: Got {} event", id, classified.name());

    if !classified.is_forwarded() {
        info!("{}: Got a test ping", id);
        return DeliveryOutcome::Acknowledged;
    }

    if matches!(classified, Event::Membership) {
        let summary = ctx
            .forwarder
            .forward(&ctx.config.membership_forward_urls, &headers, &payload, &id)
            .await;
        return DeliveryOutcome::Forwarded(summary);
    }

    if let Some(sender) = events::sender_login(&payload) {
        if ctx.config.is_ignored_sender(sender) {
            info!("{}: Ignoring delivery from {}", id, sender);
            return DeliveryOutcome::Ignored;
        }
    }

    if let Err(e) = translate_payload(ctx, &classified, &mut payload).await {
        error!("{}: {:#}", id, e);
    }

    let outcome = match ctx.config.forward_urls.first() {
        Some(first) => {
            if events::rewrite_hook_url(&mut payload, first) {
                info!("{}: Rewrote hook URL to {}", id, first);
            }
            let summary = ctx
                .forwarder
                .forward(&ctx.config.forward_urls, &headers, &payload, &id)
                .await;
            DeliveryOutcome::Forwarded(summary)
        }
        None => DeliveryOutcome::NotForwarded,
    };

    let elapsed = Utc::now() - received_at;
    info!("{}: Done in {}ms", id, elapsed.num_milliseconds());
    outcome
}

/// Run the translation step for routed events and rewrite the payload with
/// the translated text.
async fn translate_payload(ctx: &AppContext, event: &Event, payload: &mut Value) -> Result<()> {
    let orchestrator = Orchestrator::new(
        ctx.forge.as_ref(),
        ctx.completer.as_ref(),
        ctx.config.openai_temperature,
    );
    let Some(key) = event.payload_key() else {
        return Ok(());
    };

    match event {
        Event::IssueOpened(ev) | Event::DiscussionCreated(ev) | Event::PullRequestOpened(ev) => {
            info!("Got {} {}", ev.object, ev.title);
            let report = orchestrator.process(&ev.object).await?;
            events::rewrite_object(payload, key, &report.title, &report.body);
        }
        Event::IssueCommentCreated(c)
        | Event::DiscussionCommentCreated(c)
        | Event::PullRequestReviewSubmitted(c)
        | Event::PullRequestReviewCommentCreated(c) => {
            if let Some(body) = orchestrator
                .translate_comment(c.kind, &c.node_id, &c.body)
                .await?
            {
                info!("Translated {} {}", c.kind, c.url);
                events::rewrite_body(payload, key, &body);
            }
        }
        _ => {}
    }
    Ok(())
}

pub struct Dispatcher {
    ctx: Arc<AppContext>,
    permits: Arc<Semaphore>,
    tasks: Mutex<JoinSet<()>>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        let permits = Arc::new(Semaphore::new(ctx.config.max_concurrent_deliveries.max(1)));
        Self {
            ctx,
            permits,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Schedule `delivery` and return without waiting for it.
    pub async fn dispatch(&self, delivery: Delivery) {
        let ctx = Arc::clone(&self.ctx);
        let permits = Arc::clone(&self.permits);

        let mut tasks = self.tasks.lock().await;
        // Reap finished workers so the set does not grow without bound.
        while let Some(result) = tasks.try_join_next() {
            if let Err(e) = result {
                error!("Delivery worker panicked: {}", e);
            }
        }

        tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            handle_delivery(&ctx, delivery).await;
        });
    }

    /// Number of workers not yet reaped.
    pub async fn pending(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Wait for every scheduled worker to finish.
    pub async fn shutdown(&self) {
        let mut tasks = self.tasks.lock().await;
        info!("Waiting for {} delivery workers", tasks.len());
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("Delivery worker panicked: {}", e);
            }
        }
    }
}
