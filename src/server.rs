//! Webhook listener.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/v1/echo` | Liveness check, answers `HelloWorld` |
//! | `POST` | `/api/v1/hooks` | Webhook delivery |
//! | `POST` | `/api/v1/hooks/:secret` | Webhook delivery carrying the path secret |
//!
//! Deliveries are answered with 204 as soon as they are scheduled; the work
//! happens in [`Dispatcher`] workers.

use crate::config::Config;
use crate::dispatch::{AppContext, Delivery, Dispatcher};
use crate::security::hook_secret_matches;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub const EVENT_HEADER: &str = "x-github-event";
pub const DELIVERY_HEADER: &str = "x-github-delivery";

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
}

pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/api/v1/echo", get(handle_echo))
        .route("/api/v1/hooks", post(handle_hook))
        .route("/api/v1/hooks/:secret", post(handle_hook_with_secret))
        .fallback(handle_not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { dispatcher })
}

/// Bind the configured port and serve until Ctrl-C, then wait for the
/// outstanding workers.
pub async fn run_server(config: Config) -> Result<()> {
    let bind_addr = format!("0.0.0.0:{}", config.port);
    let ctx = AppContext::from_config(config)?;
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(ctx)));

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!("Serving on http://{}", bind_addr);

    serve(listener, dispatcher, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve<S>(listener: TcpListener, dispatcher: Arc<Dispatcher>, shutdown: S) -> Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(Arc::clone(&dispatcher)))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")?;

    dispatcher.shutdown().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
    }
}

async fn handle_echo() -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/plain")], "HelloWorld")
}

async fn handle_not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn handle_hook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    accept_delivery(&state, None, headers, body).await
}

async fn handle_hook_with_secret(
    State(state): State<AppState>,
    Path(secret): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    accept_delivery(&state, Some(&secret), headers, body).await
}

async fn accept_delivery(
    state: &AppState,
    secret: Option<&str>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let config = &state.dispatcher.context().config;
    if !hook_secret_matches(config.webhook_secret.as_deref(), secret) {
        warn!("Rejected hook delivery with missing or wrong secret");
        return StatusCode::FORBIDDEN;
    }

    let event = header_value(&headers, EVENT_HEADER);
    let id = header_value(&headers, DELIVERY_HEADER)
        .unwrap_or_else(|| format!("local-{}", Utc::now().timestamp_millis()));

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("{}: Invalid JSON body ({}B): {}", id, body.len(), e);
            return StatusCode::BAD_REQUEST;
        }
    };

    info!(
        "{}: Got POST body {}B, event={}",
        id,
        body.len(),
        event.as_deref().unwrap_or("-")
    );

    state
        .dispatcher
        .dispatch(Delivery {
            id,
            event,
            headers,
            payload,
            received_at: Utc::now(),
        })
        .await;

    StatusCode::NO_CONTENT
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|v| !v.is_empty())
}
