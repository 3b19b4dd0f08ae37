//! Strategy-driven retry with backoff and jitter.
//!
//! The retry policy is plain data: a strategy enum plus numeric parameters,
//! swappable by configuration. [`RetryHandler::execute`] repeats an
//! operation while either a retriable error occurs or the retry predicate
//! rejects its result. Non-retriable errors propagate immediately without
//! sleeping.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::error::CrawlerError;
use crate::types::CrawlResult;

/// HTTP statuses that trigger a retry under the default predicate.
pub const DEFAULT_RETRY_CODES: &[u16] = &[408, 429, 500, 502, 503, 504];

/// Responses shorter than this are treated as not fully loaded.
const MIN_HTML_LEN: usize = 500;

/// How the delay before the n-th retry is computed from the base delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// `delay = base`
    Fixed,
    /// `delay = base * (1 + attempt * factor)`
    Linear,
    /// `delay = base * factor^attempt`
    Exponential,
    /// `delay = base * fib(attempt + 1)`
    Fibonacci,
}

/// Retry policy as data.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure. 0 disables retries.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub strategy: BackoffStrategy,
    pub backoff_factor: f64,
    /// Uniform jitter fraction: the actual delay gains a random amount in
    /// `[0, jitter * delay]`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            strategy: BackoffStrategy::Exponential,
            backoff_factor: 1.5,
            jitter: 0.5,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following 0-indexed `attempt`, jitter included.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_secs_f64();
        let delay = match self.strategy {
            BackoffStrategy::Fixed => base,
            BackoffStrategy::Linear => base * (1.0 + f64::from(attempt) * self.backoff_factor),
            BackoffStrategy::Exponential => {
                base * self.backoff_factor.powi(i32::try_from(attempt.min(64)).unwrap_or(64))
            }
            #[allow(clippy::cast_precision_loss)]
            BackoffStrategy::Fibonacci => base * fibonacci(attempt + 1) as f64,
        };
        let jittered = if self.jitter > 0.0 {
            delay + rand::random::<f64>() * self.jitter * delay
        } else {
            delay
        };
        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// n-th Fibonacci number with `fib(0) = fib(1) = 1`, saturating on overflow.
fn fibonacci(n: u32) -> u64 {
    let (mut a, mut b) = (1u64, 1u64);
    for _ in 0..n {
        let next = a.saturating_add(b);
        a = b;
        b = next;
    }
    a
}

/// Predicate deciding whether a produced result should be retried. A
/// caller-supplied predicate fully replaces the default condition.
pub type RetryPredicate = Box<dyn Fn(&CrawlResult) -> bool + Send + Sync>;

/// Default retry condition: retry when the fetch did not succeed, the HTML
/// is missing or suspiciously small, or the HTTP status is in the retry set.
#[must_use]
pub fn default_retry_condition(result: &CrawlResult) -> bool {
    if !result.success {
        return true;
    }
    if result.html_len() < MIN_HTML_LEN {
        return true;
    }
    if let Some(status) = result.status {
        if DEFAULT_RETRY_CODES.contains(&status) {
            return true;
        }
    }
    false
}

pub struct RetryHandler {
    policy: RetryPolicy,
    predicate: Option<RetryPredicate>,
    attempts_remaining: AtomicU32,
}

impl RetryHandler {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        let attempts = policy.max_retries;
        Self {
            policy,
            predicate: None,
            attempts_remaining: AtomicU32::new(attempts),
        }
    }

    /// Replaces the default retry condition entirely.
    #[must_use]
    pub fn with_predicate(mut self, predicate: RetryPredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Attempts left after the most recent `execute` call; equals
    /// `max_retries - attempts_used` once execution completes.
    #[must_use]
    pub fn attempts_remaining(&self) -> u32 {
        self.attempts_remaining.load(Ordering::SeqCst)
    }

    fn should_retry(&self, result: &CrawlResult) -> bool {
        match &self.predicate {
            Some(predicate) => predicate(result),
            None => default_retry_condition(result),
        }
    }

    /// Runs `operation` with up to `max_retries` additional attempts.
    ///
    /// After exhausting all attempts, the last retriable error is surfaced;
    /// if the final attempt instead produced a result that merely failed the
    /// predicate, that result is returned rather than an error.
    ///
    /// # Errors
    ///
    /// Returns the first non-retriable error immediately, or the last
    /// retriable error once every attempt has been used.
    pub async fn execute<F, Fut>(&self, mut operation: F) -> Result<CrawlResult, CrawlerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<CrawlResult, CrawlerError>>,
    {
        let max_retries = self.policy.max_retries;
        self.attempts_remaining.store(max_retries, Ordering::SeqCst);

        let mut last_error: Option<CrawlerError> = None;
        let mut last_result: Option<CrawlResult> = None;
        let mut attempt = 0u32;

        while attempt <= max_retries {
            if attempt > 0 {
                let delay = self.policy.delay_for(attempt - 1);
                tracing::info!(
                    attempt,
                    max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after backoff"
                );
                tokio::time::sleep(delay).await;
            }

            match operation().await {
                Ok(result) => {
                    if !self.should_retry(&result) {
                        self.attempts_remaining
                            .store(max_retries - attempt, Ordering::SeqCst);
                        return Ok(result);
                    }
                    tracing::warn!(
                        attempt = attempt + 1,
                        total = max_retries + 1,
                        "retry condition triggered"
                    );
                    last_result = Some(result);
                    last_error = None;
                }
                Err(err) if err.is_retriable() => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        total = max_retries + 1,
                        error = %err,
                        "retriable error"
                    );
                    last_error = Some(err);
                    last_result = None;
                }
                Err(err) => {
                    self.attempts_remaining
                        .store(max_retries - attempt, Ordering::SeqCst);
                    return Err(err);
                }
            }

            attempt += 1;
            self.attempts_remaining
                .store(max_retries.saturating_sub(attempt), Ordering::SeqCst);
        }

        match (last_error, last_result) {
            (Some(err), _) => Err(err),
            (None, Some(result)) => Ok(result),
            // Unreachable: the loop always runs at least once.
            (None, None) => Err(CrawlerError::Config("retry loop did not run".to_owned())),
        }
    }
}

#[cfg(test)]
#[path = "retry_test.rs"]
mod tests;
