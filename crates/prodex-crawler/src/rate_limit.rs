//! Per-fetcher request rate limiting.
//!
//! Enforces a minimum interval of `60 / requests_per_minute` seconds between
//! successive fetch *start times*. Acquisition is serialized through one
//! mutex, but the lock is released before the fetch itself runs, so many
//! fetches may be in flight at once.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::CrawlerError;

pub struct RateLimiter {
    min_interval: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `requests_per_minute` fetch starts per minute.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlerError::Config`] when `requests_per_minute` is zero.
    pub fn new(requests_per_minute: u32) -> Result<Self, CrawlerError> {
        if requests_per_minute == 0 {
            return Err(CrawlerError::Config(
                "rate limit must be at least 1 request per minute".to_owned(),
            ));
        }
        Ok(Self {
            min_interval: Duration::from_secs_f64(60.0 / f64::from(requests_per_minute)),
            last_start: Mutex::new(None),
        })
    }

    /// Waits until the configured interval has elapsed since the previous
    /// acquisition, then records the new start time.
    pub async fn acquire(&self) {
        let mut last = self.last_start.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limiting fetch start");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }

    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rate_is_rejected() {
        assert!(matches!(RateLimiter::new(0), Err(CrawlerError::Config(_))));
    }

    #[test]
    fn interval_is_sixty_over_n() {
        let limiter = RateLimiter::new(30).expect("valid rate");
        assert_eq!(limiter.min_interval(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn first_acquire_does_not_wait() {
        let limiter = RateLimiter::new(1).expect("valid rate");
        let before = Instant::now();
        limiter.acquire().await;
        assert_eq!(Instant::now(), before, "first acquisition must be immediate");
    }

    #[tokio::test(start_paused = true)]
    async fn second_acquire_waits_the_full_interval() {
        let limiter = RateLimiter::new(60).expect("valid rate");
        limiter.acquire().await;
        let before = Instant::now();
        limiter.acquire().await;
        let waited = Instant::now() - before;
        assert!(
            waited >= Duration::from_secs(1),
            "expected >= 1s wait, got {waited:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_time_counts_toward_the_interval() {
        let limiter = RateLimiter::new(60).expect("valid rate");
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_millis(600)).await;
        let before = Instant::now();
        limiter.acquire().await;
        let waited = Instant::now() - before;
        assert!(
            waited <= Duration::from_millis(450),
            "only the remainder of the interval should be waited, got {waited:?}"
        );
    }
}
