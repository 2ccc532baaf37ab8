use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Jittered pause between consecutive targets, so requests don't arrive on a
/// fixed cadence.
pub struct RateLimiter {
    min: Duration,
    max: Duration,
    rng: StdRng,
}

impl RateLimiter {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self::with_rng(min, max, StdRng::from_entropy())
    }

    pub fn with_rng(min: Duration, max: Duration, rng: StdRng) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self { min, max, rng }
    }

    pub fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(min_ms), Duration::from_millis(max_ms))
    }

    pub fn next_delay(&mut self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let ms = self
            .rng
            .gen_range(self.min.as_millis() as u64..=self.max.as_millis() as u64);
        Duration::from_millis(ms)
    }

    pub async fn pause(&mut self) -> Duration {
        let delay = self.next_delay();
        debug!(delay_ms = delay.as_millis() as u64, "pacing before next target");
        sleep(delay).await;
        delay
    }
}
