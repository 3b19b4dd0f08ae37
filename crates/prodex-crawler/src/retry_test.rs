use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::*;

fn zero_jitter_policy(max_retries: u32, strategy: BackoffStrategy) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_secs(1),
        strategy,
        backoff_factor: 2.0,
        jitter: 0.0,
    }
}

fn instant_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::ZERO,
        strategy: BackoffStrategy::Fixed,
        backoff_factor: 1.0,
        jitter: 0.0,
    }
}

fn good_result() -> CrawlResult {
    CrawlResult::success("https://example.com/p/1", "x".repeat(600), Some(200))
}

fn bad_status_result(status: u16) -> CrawlResult {
    CrawlResult::failure("https://example.com/p/1", format!("HTTP {status}"), Some(status))
}

// ---------------------------------------------------------------------------
// Delay computation
// ---------------------------------------------------------------------------

#[test]
fn fixed_delay_is_constant() {
    let policy = zero_jitter_policy(3, BackoffStrategy::Fixed);
    assert_eq!(policy.delay_for(0), Duration::from_secs(1));
    assert_eq!(policy.delay_for(5), Duration::from_secs(1));
}

#[test]
fn linear_delay_grows_with_attempt() {
    let policy = zero_jitter_policy(3, BackoffStrategy::Linear);
    assert_eq!(policy.delay_for(0), Duration::from_secs(1));
    assert_eq!(policy.delay_for(1), Duration::from_secs(3));
    assert_eq!(policy.delay_for(2), Duration::from_secs(5));
}

#[test]
fn exponential_delay_doubles() {
    let policy = zero_jitter_policy(3, BackoffStrategy::Exponential);
    assert_eq!(policy.delay_for(0), Duration::from_secs(1));
    assert_eq!(policy.delay_for(1), Duration::from_secs(2));
    assert_eq!(policy.delay_for(2), Duration::from_secs(4));
}

#[test]
fn fibonacci_delay_follows_the_sequence() {
    let policy = zero_jitter_policy(5, BackoffStrategy::Fibonacci);
    // fib(attempt + 1) with fib(0) = fib(1) = 1: 1, 2, 3, 5, 8
    assert_eq!(policy.delay_for(0), Duration::from_secs(1));
    assert_eq!(policy.delay_for(1), Duration::from_secs(2));
    assert_eq!(policy.delay_for(2), Duration::from_secs(3));
    assert_eq!(policy.delay_for(3), Duration::from_secs(5));
    assert_eq!(policy.delay_for(4), Duration::from_secs(8));
}

#[test]
fn jitter_adds_at_most_the_configured_fraction() {
    let policy = RetryPolicy {
        jitter: 0.5,
        ..zero_jitter_policy(3, BackoffStrategy::Fixed)
    };
    for _ in 0..50 {
        let delay = policy.delay_for(0);
        assert!(delay >= Duration::from_secs(1));
        assert!(delay <= Duration::from_millis(1500));
    }
}

// ---------------------------------------------------------------------------
// Default retry condition
// ---------------------------------------------------------------------------

#[test]
fn default_condition_passes_good_results() {
    assert!(!default_retry_condition(&good_result()));
}

#[test]
fn default_condition_retries_unsuccessful_results() {
    assert!(default_retry_condition(&bad_status_result(503)));
}

#[test]
fn default_condition_retries_small_html() {
    let result = CrawlResult::success("https://example.com", "tiny".to_owned(), Some(200));
    assert!(default_retry_condition(&result));
}

#[test]
fn default_condition_retries_every_retry_code() {
    for &code in DEFAULT_RETRY_CODES {
        let mut result = good_result();
        result.status = Some(code);
        assert!(default_retry_condition(&result), "code {code}");
    }
}

// ---------------------------------------------------------------------------
// Execute
// ---------------------------------------------------------------------------

#[tokio::test]
async fn succeeds_immediately_on_first_try() {
    let calls = Arc::new(AtomicU32::new(0));
    let handler = RetryHandler::new(instant_policy(3));
    let c = Arc::clone(&calls);
    let result = handler
        .execute(|| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(good_result())
            }
        })
        .await;
    assert!(result.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(handler.attempts_remaining(), 3);
}

#[tokio::test]
async fn always_failing_predicate_runs_exactly_max_plus_one_times() {
    let calls = Arc::new(AtomicU32::new(0));
    let handler = RetryHandler::new(instant_policy(4));
    let c = Arc::clone(&calls);
    let result = handler
        .execute(|| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(bad_status_result(503))
            }
        })
        .await;
    // max_retries = 4 → exactly 5 invocations
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    // A final result that merely failed the predicate is returned, not an error.
    let result = result.expect("last result should be surfaced");
    assert!(!result.success);
    assert_eq!(handler.attempts_remaining(), 0);
}

#[tokio::test]
async fn retries_then_returns_the_successful_result() {
    let calls = Arc::new(AtomicU32::new(0));
    let handler = RetryHandler::new(instant_policy(3));
    let c = Arc::clone(&calls);
    let result = handler
        .execute(|| {
            let c = Arc::clone(&c);
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Ok(bad_status_result(503))
                } else {
                    Ok(good_result())
                }
            }
        })
        .await
        .expect("should eventually succeed");
    assert!(result.success);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // Two retries were used.
    assert_eq!(handler.attempts_remaining(), 1);
}

#[tokio::test]
async fn non_retriable_error_propagates_immediately() {
    let calls = Arc::new(AtomicU32::new(0));
    let handler = RetryHandler::new(instant_policy(3));
    let c = Arc::clone(&calls);
    let result = handler
        .execute(|| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(CrawlerError::Config("bad setup".to_owned()))
            }
        })
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(result, Err(CrawlerError::Config(_))));
}

#[tokio::test]
async fn last_retriable_error_is_surfaced_after_exhaustion() {
    let handler = RetryHandler::new(instant_policy(2));
    let calls = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&calls);
    let result = handler
        .execute(|| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(CrawlerError::Render {
                    url: "https://example.com".to_owned(),
                    reason: "timeout".to_owned(),
                })
            }
        })
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(matches!(result, Err(CrawlerError::Render { .. })));
}

#[tokio::test]
async fn custom_predicate_replaces_the_default() {
    // Accept everything, even results the default predicate would retry.
    let handler = RetryHandler::new(instant_policy(3)).with_predicate(Box::new(|_| false));
    let calls = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&calls);
    let result = handler
        .execute(|| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(bad_status_result(503))
            }
        })
        .await
        .expect("predicate accepts the result");
    assert!(!result.success);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn exponential_backoff_sleeps_the_expected_total() {
    // base 1s, factor 2, jitter 0: retries sleep 1s then 2s → >= 3s total.
    let handler = RetryHandler::new(RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_secs(1),
        strategy: BackoffStrategy::Exponential,
        backoff_factor: 2.0,
        jitter: 0.0,
    });
    let calls = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&calls);
    let started = tokio::time::Instant::now();
    let result = handler
        .execute(|| {
            let c = Arc::clone(&c);
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Ok(bad_status_result(503))
                } else {
                    Ok(good_result())
                }
            }
        })
        .await
        .expect("succeeds on the third attempt");
    assert!(result.success);
    let elapsed = started.elapsed();
    assert!(
        elapsed >= Duration::from_secs(3),
        "expected at least 1s + 2s of backoff, got {elapsed:?}"
    );
    // retries used = max_retries - attempts_remaining
    assert_eq!(handler.policy().max_retries - handler.attempts_remaining(), 2);
}
