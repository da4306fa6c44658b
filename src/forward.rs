//! Relay of (possibly rewritten) deliveries to downstream sinks.

use crate::retry::{with_retry_if, RetryConfig};
use futures::future::join_all;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

/// User agent sinks expect from forge webhooks.
pub const HOOKSHOT_USER_AGENT: &str = "GitHub-Hookshot/4689486";

/// Inbound headers that describe the inbound connection rather than the
/// delivery.
const HOP_HEADERS: &[&str] = &[
    "host",
    "content-type",
    "content-length",
    "connection",
    "transfer-encoding",
    "accept-encoding",
    "user-agent",
];

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("sink {sink} answered {status}")]
    Status { sink: String, status: u16 },
    #[error("failed to reach sink {sink}: {source}")]
    Transport {
        sink: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ForwardError {
    fn is_transient(&self) -> bool {
        match self {
            ForwardError::Status { status, .. } => *status >= 500 || *status == 429,
            ForwardError::Transport { .. } => true,
        }
    }
}

/// Headers to send downstream: the inbound ones minus connection-level
/// headers, with a JSON content type and the hookshot user agent.
pub fn forward_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len() + 2);
    for (name, value) in inbound {
        if !HOP_HEADERS.contains(&name.as_str()) {
            headers.append(name.clone(), value.clone());
        }
    }
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(HOOKSHOT_USER_AGENT));
    headers
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardSummary {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl Forwarder {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            retry: RetryConfig::forward(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// POST `payload` to every sink concurrently. Failures are logged and
    /// counted, never returned.
    pub async fn forward(
        &self,
        sinks: &[String],
        inbound: &HeaderMap,
        payload: &Value,
        delivery: &str,
    ) -> ForwardSummary {
        if sinks.is_empty() {
            return ForwardSummary::default();
        }

        let body = match serde_json::to_vec(payload) {
            Ok(body) => body,
            Err(e) => {
                warn!("{}: Failed to serialize payload: {}", delivery, e);
                return ForwardSummary {
                    delivered: 0,
                    failed: sinks.len(),
                };
            }
        };
        let headers = forward_headers(inbound);

        let results = join_all(sinks.iter().map(|sink| {
            let headers = headers.clone();
            let body = body.clone();
            async move {
                with_retry_if(
                    &self.retry,
                    "Forward",
                    || self.post(sink, headers.clone(), body.clone()),
                    ForwardError::is_transient,
                )
                .await
            }
        }))
        .await;

        let mut summary = ForwardSummary::default();
        for (sink, result) in sinks.iter().zip(results) {
            match result {
                Ok(status) => {
                    info!(
                        "{}: Forwarded {}B to {} ({})",
                        delivery,
                        body.len(),
                        sink,
                        status
                    );
                    summary.delivered += 1;
                }
                Err(e) => {
                    warn!("{}: {}", delivery, e);
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    async fn post(
        &self,
        sink: &str,
        headers: HeaderMap,
        body: Vec<u8>,
    ) -> Result<u16, ForwardError> {
        let response = self
            .client
            .post(sink)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|source| ForwardError::Transport {
                sink: sink.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ForwardError::Status {
                sink: sink.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(status.as_u16())
    }
}
