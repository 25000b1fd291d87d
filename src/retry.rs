//! Fixed-count, fixed-delay retries for remote operations.

use std::{fmt::Display, thread, time::Duration};

use backon::{BlockingRetryable, ConstantBuilder};

pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = max_retries + 1.
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }
}

/// Fixed-delay backoff allowing `policy.max_retries` retries after the first
/// attempt.
pub fn backoff(policy: RetryPolicy) -> ConstantBuilder {
    ConstantBuilder::default()
        .with_delay(policy.delay)
        .with_max_times(policy.max_retries as usize)
}

/// Run `operation` until it succeeds, the policy's retries are exhausted, or
/// `retryable` rejects the last error.
///
/// Blocks the calling thread for `policy.delay` before every retry and
/// returns the last error when all attempts fail.
pub fn with_retries<T, E, F, W>(
    policy: RetryPolicy,
    label: &str,
    retryable: W,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    W: FnMut(&E) -> bool,
    E: Display,
{
    let mut attempt = 0;
    operation
        .retry(backoff(policy))
        .sleep(thread::sleep)
        .when(retryable)
        .notify(|error, delay| {
            attempt += 1;
            tracing::debug!(
                "Retry {}/{} in {:?}: {} ({})",
                attempt,
                policy.max_retries,
                delay,
                label,
                error
            );
        })
        .call()
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn fails_then_succeeds(failures: u32) -> impl FnMut() -> Result<u32, String> {
        let mut calls = 0;
        move || {
            calls += 1;
            if calls <= failures {
                Err(format!("failure #{calls}"))
            } else {
                Ok(calls)
            }
        }
    }

    #[test]
    fn test_succeeds_first_try() {
        let result = with_retries(
            RetryPolicy::new(2, Duration::ZERO),
            "op",
            |_| true,
            fails_then_succeeds(0),
        );
        assert_eq!(result, Ok(1));
    }

    #[test]
    fn test_recovers_after_k_failures() {
        for k in 0..=3 {
            let result = with_retries(
                RetryPolicy::new(3, Duration::ZERO),
                "op",
                |_| true,
                fails_then_succeeds(k),
            );
            // Returned value is the invocation count.
            assert_eq!(result, Ok(k + 1));
        }
    }

    #[test]
    fn test_always_failing_runs_r_plus_one_times() {
        let mut calls = 0;
        let result: Result<(), String> =
            with_retries(RetryPolicy::new(4, Duration::ZERO), "op", |_| true, || {
                calls += 1;
                Err(format!("failure #{calls}"))
            });
        assert_eq!(calls, 5);
        assert_eq!(result, Err("failure #5".to_string()));
    }

    #[test]
    fn test_no_retries() {
        let result = with_retries(RetryPolicy::none(), "op", |_| true, fails_then_succeeds(1));
        assert_eq!(result, Err("failure #1".to_string()));
    }

    #[test]
    fn test_sleeps_between_attempts() {
        let start = Instant::now();
        let result = with_retries(
            RetryPolicy::new(2, Duration::from_millis(20)),
            "op",
            |_| true,
            fails_then_succeeds(2),
        );
        assert_eq!(result, Ok(3));
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_stops_when_error_is_not_retryable() {
        let mut calls = 0;
        let result: Result<(), String> = with_retries(
            RetryPolicy::new(5, Duration::ZERO),
            "op",
            |error: &String| error != "fatal",
            || {
                calls += 1;
                Err(if calls < 2 { "transient" } else { "fatal" }.to_string())
            },
        );
        assert_eq!(calls, 2);
        assert_eq!(result, Err("fatal".to_string()));
    }

    #[test]
    fn test_backoff_is_fixed_delay() {
        use backon::BackoffBuilder;

        let delays: Vec<Duration> = backoff(RetryPolicy::new(3, Duration::from_secs(2)))
            .build()
            .collect();
        assert_eq!(delays, vec![Duration::from_secs(2); 3]);
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.delay, Duration::from_secs(3));
    }
}
