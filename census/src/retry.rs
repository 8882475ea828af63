//! Retry with a fixed delay.
//!
//! The census talks to rate-limited public nodes, so a failed request is
//! simply tried again after the same delay. By default there is no cap; a
//! cap turns the policy into a circuit breaker without touching the caller.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    delay: Duration,
    /// Retries allowed after the first failed attempt. `None` = forever.
    max_retries: Option<u32>,
}

/// A value obtained after `failures` failed attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    pub value: T,
    pub failures: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetriesExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

impl RetryPolicy {
    pub fn forever(delay: Duration) -> Self {
        Self {
            delay,
            max_retries: None,
        }
    }

    pub fn capped(delay: Duration, max_retries: u32) -> Self {
        Self {
            delay,
            max_retries: Some(max_retries),
        }
    }

    pub fn new(delay: Duration, max_retries: Option<u32>) -> Self {
        Self { delay, max_retries }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    /// Sleep for the configured delay.
    pub async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    /// Run `op` until it succeeds, sleeping `delay` after every failure.
    ///
    /// `what` only feeds the warning logged on each failure.
    pub async fn run<T, E, F, Fut>(
        &self,
        what: &str,
        mut op: F,
    ) -> Result<Retried<T>, RetriesExhausted<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut failures: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(Retried { value, failures }),
                Err(e) => {
                    failures = failures.saturating_add(1);
                    if let Some(max) = self.max_retries {
                        if failures > max {
                            log::error!("{} failed {} times, giving up: {}", what, failures, e);
                            return Err(RetriesExhausted {
                                attempts: failures,
                                last_error: e,
                            });
                        }
                    }
                    log::warn!(
                        "{} failed (attempt {}): {} - retrying in {}ms",
                        what,
                        failures,
                        e,
                        self.delay.as_millis()
                    );
                    self.pause().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_forever_retries_until_success() {
        let calls = Cell::new(0u32);
        let policy = RetryPolicy::forever(Duration::ZERO);

        let result = policy
            .run("flaky", || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n < 6 {
                        Err(format!("failure {}", n))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, Retried { value: 6, failures: 5 });
        assert_eq!(calls.get(), 6);
    }

    #[tokio::test]
    async fn test_capped_gives_up() {
        let calls = Cell::new(0u32);
        let policy = RetryPolicy::capped(Duration::ZERO, 2);

        let err = policy
            .run("dead node", || {
                calls.set(calls.get() + 1);
                async { Err::<(), _>("connection refused") }
            })
            .await
            .unwrap_err();

        // first attempt + 2 retries
        assert_eq!(calls.get(), 3);
        assert_eq!(err.attempts, 3);
        assert_eq!(err.last_error, "connection refused");
    }

    #[tokio::test]
    async fn test_capped_zero_is_single_attempt() {
        let policy = RetryPolicy::capped(Duration::ZERO, 0);
        let err = policy
            .run("once", || async { Err::<(), _>("nope") })
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_attempts() {
        let calls = Cell::new(0u32);
        let policy = RetryPolicy::forever(Duration::from_millis(1500));
        let started = tokio::time::Instant::now();

        policy
            .run("paced", || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { if n < 3 { Err("busy") } else { Ok(()) } }
            })
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(3000));
    }
}
