//! Per-source token bucket. Spec §4.4.
//!
//! Grounded on `rootsignal-scout/src/pipeline/scraper.rs`'s `ChromeScraper`:
//! the same `tokio::sync::Mutex`-guarded shared state, exponential-style
//! jittered delay via `rand`, and `tracing` instrumentation, reused here for
//! pacing instead of retry backoff.

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::Mutex;
use tracing::trace;

use crate::error::{BrowserPoolError, Result};

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket limiter, one instance per `Source`. Configured from
/// `Source.rateLimitPerMin`.
pub struct RateLimiter {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_per_sec: f64,
    token_interval: Duration,
}

impl RateLimiter {
    pub fn new(rate_limit_per_min: u32) -> Self {
        let rate_limit_per_min = rate_limit_per_min.max(1);
        let refill_per_sec = rate_limit_per_min as f64 / 60.0;
        Self {
            state: Mutex::new(BucketState { tokens: 1.0, last_refill: Instant::now() }),
            capacity: 1.0,
            refill_per_sec,
            token_interval: Duration::from_secs_f64(60.0 / rate_limit_per_min as f64),
        }
    }

    /// Blocks, respecting `shutdown`, until a token is available.
    pub async fn acquire(&self, shutdown: &mut tokio::sync::watch::Receiver<bool>) -> Result<()> {
        loop {
            let took_immediately = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    true
                } else {
                    false
                }
            };

            if took_immediately {
                // Bursting: the token was already sitting there, so smooth
                // the spike with jitter in [0, 50%] of the token interval.
                let jitter_cap_ms = (self.token_interval.as_millis() as f64 * 0.5) as u64;
                if jitter_cap_ms > 0 {
                    let jitter_ms = rand::rng().random_range(0..=jitter_cap_ms);
                    if jitter_ms > 0 {
                        trace!(jitter_ms, "rate limiter applying burst jitter");
                        tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
                    }
                }
                return Ok(());
            }

            tokio::select! {
                _ = shutdown.changed() => return Err(BrowserPoolError::Cancelled),
                _ = tokio::time::sleep(self.token_interval / 4) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_succeeds_without_shutdown() {
        let limiter = RateLimiter::new(600); // 10/sec, fast enough for a test
        let (_tx, mut rx) = tokio::sync::watch::channel(false);
        limiter.acquire(&mut rx).await.unwrap();
        limiter.acquire(&mut rx).await.unwrap();
    }

    #[tokio::test]
    async fn acquire_respects_shutdown_when_starved() {
        let limiter = RateLimiter::new(1); // 1/min — effectively starved within test window
        let (tx, mut rx) = tokio::sync::watch::channel(false);
        limiter.acquire(&mut rx).await.unwrap(); // consumes the initial token

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = tx.send(true);
        });

        let result = limiter.acquire(&mut rx).await;
        assert!(matches!(result, Err(BrowserPoolError::Cancelled)));
    }
}
