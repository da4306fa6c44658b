//! Bounded retries for the outbound calls (completion, forge, sinks).

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total tries, the first one included. Zero behaves like one.
    pub max_attempts: u32,
    /// Pause before the second try; zero disables pausing altogether.
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Growth factor of the pause between consecutive tries.
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Doubling backoff capped at 30s.
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }

    pub fn capped_at(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Completion calls: 3 tries back to back.
    pub fn completion() -> Self {
        Self::new(3, Duration::ZERO)
    }

    /// Forge GraphQL calls: 3 tries, pausing 500ms then 1s.
    pub fn forge() -> Self {
        Self::new(3, Duration::from_millis(500)).capped_at(Duration::from_secs(4))
    }

    /// Sink POSTs: 3 tries, pausing 1s then 2s.
    pub fn forward() -> Self {
        Self::new(3, Duration::from_secs(1)).capped_at(Duration::from_secs(5))
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Pause before try number `attempt` (1-based). The first try never waits.
    fn pause_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 || self.initial_delay.is_zero() {
            return Duration::ZERO;
        }
        let factor = self.backoff_multiplier.powi(attempt as i32 - 2);
        self.initial_delay.mul_f64(factor).min(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::forge()
    }
}

/// Run `operation` until it succeeds, `should_retry` rejects the error, or the
/// tries run out. The last error is returned as is.
pub async fn with_retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    what: &str,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let attempts = config.attempts();
    let mut attempt = 1;

    loop {
        let pause = config.pause_before(attempt);
        if !pause.is_zero() {
            debug!("{}: waiting {:?} before try {}/{}", what, pause, attempt, attempts);
            sleep(pause).await;
        }

        let error = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{}: succeeded on try {}/{}", what, attempt, attempts);
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if !should_retry(&error) {
            debug!("{}: giving up on permanent error: {}", what, error);
            return Err(error);
        }
        if attempt >= attempts {
            warn!("{}: failed after {} tries: {}", what, attempts, error);
            return Err(error);
        }

        warn!("{}: try {}/{} failed: {}", what, attempt, attempts, error);
        attempt += 1;
    }
}
