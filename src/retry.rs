use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::Disposition;

/// Bounded retry with a fixed cooldown between attempts.
///
/// `max_attempts` counts every attempt, the first one included.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub cooldown: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, cooldown: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            cooldown,
        }
    }

    /// Runs `op` until it succeeds, `classify` says abort, or the attempts run
    /// out. The last error is returned in the latter two cases.
    pub async fn run<T, E, F, Fut, C>(&self, label: &str, mut op: F, classify: C) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> Disposition,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if classify(&e) == Disposition::Abort {
                        warn!(label, attempt, error = %e, "attempt failed, not retryable");
                        return Err(e);
                    }
                    if attempt >= self.max_attempts {
                        warn!(label, attempt, error = %e, "attempt failed, retries exhausted");
                        return Err(e);
                    }
                    warn!(
                        label,
                        attempt,
                        remaining = self.max_attempts - attempt,
                        error = %e,
                        "attempt failed, retrying"
                    );
                    sleep(self.cooldown).await;
                    attempt += 1;
                    info!(label, attempt, "retrying");
                }
            }
        }
    }
}
