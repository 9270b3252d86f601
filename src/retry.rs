//! Bounded retry for calls to external services.

use std::future::Future;
use std::time::Duration;

/// How a failed attempt should be treated.
#[derive(Debug)]
pub enum Failure {
    /// Transient; try again if attempts remain.
    Retry(anyhow::Error),
    /// Permanent; give up immediately.
    Abort(anyhow::Error),
}

impl From<anyhow::Error> for Failure {
    fn from(e: anyhow::Error) -> Self {
        Failure::Retry(e)
    }
}

/// Fixed number of attempts with a fixed pause between them.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// Run `op` until it succeeds, aborts, or attempts run out. Returns the
    /// last error.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Failure>>,
    {
        let attempts = self.attempts.max(1);
        let mut last_err = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.backoff).await;
            }
            match op().await {
                Ok(value) => return Ok(value),
                Err(Failure::Abort(e)) => return Err(e),
                Err(Failure::Retry(e)) => {
                    tracing::warn!(
                        operation = what,
                        attempt,
                        attempts,
                        error = %format!("{:#}", e),
                        "attempt failed"
                    );
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} failed after retries", what)))
    }
}
