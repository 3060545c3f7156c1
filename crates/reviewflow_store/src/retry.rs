//! Conflict retry and call timeouts.
//!
//! Only [`StoreError::Conflict`] is retried. Transport failures, timeouts and
//! not-found errors surface immediately so the caller can abort the current
//! item and pick it up again on the next cycle.

use crate::error::{Result, StoreError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded exponential backoff with jitter.
///
/// `delay(n) = min(base * 2^(n-1), max) + uniform[0, jitter]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    8_000
}

fn default_jitter_ms() -> u64 {
    3_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

impl RetryPolicy {
    /// Same attempt budget with no sleeping between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter_ms: 0,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(32);
        let exp = self
            .base_delay_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_delay_ms);
        let jitter = if self.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=self.jitter_ms)
        } else {
            0
        };
        Duration::from_millis(exp + jitter)
    }
}

/// A successful outcome and the conflict retries spent reaching it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    pub value: T,
    pub retries: u32,
}

/// Bound a remote call by `after`.
pub async fn with_timeout<T, F>(operation: &str, after: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout {
            operation: operation.to_string(),
            after,
        }),
    }
}

/// Run `op` until it succeeds, fails with a non-conflict error, or the
/// attempt budget is spent.
pub async fn retry_on_conflict<T, F, Fut>(
    operation: &str,
    policy: &RetryPolicy,
    timeout: Duration,
    mut op: F,
) -> Result<Retried<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match with_timeout(operation, timeout, op()).await {
            Ok(value) => {
                return Ok(Retried {
                    value,
                    retries: attempt - 1,
                })
            }
            Err(err) if err.is_conflict() => {
                if attempt >= max_attempts {
                    warn!(operation, attempts = attempt, "Giving up after repeated conflicts");
                    return Err(StoreError::RetriesExhausted {
                        operation: operation.to_string(),
                        attempts: attempt,
                        last: err.to_string(),
                    });
                }
                let delay = policy.delay_for(attempt);
                debug!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Write conflict, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy {
            jitter_ms: 0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2_000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4_000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(8_000));
        assert_eq!(policy.delay_for(9), Duration::from_millis(8_000));
        assert_eq!(policy.delay_for(200), Duration::from_millis(8_000));
    }

    #[test]
    fn jitter_stays_in_range() {
        let policy = RetryPolicy::default();
        for attempt in 1..6 {
            let delay = policy.delay_for(attempt).as_millis() as u64;
            let floor = (1_000u64 << (attempt - 1)).min(8_000);
            assert!(delay >= floor && delay <= floor + 3_000, "{delay} for {attempt}");
        }
    }

    #[tokio::test]
    async fn conflict_then_success_reports_retries() {
        let calls = AtomicU32::new(0);
        let result = retry_on_conflict("update", &RetryPolicy::immediate(5), Duration::from_secs(1), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(StoreError::conflict("busy"))
            } else {
                Ok("done")
            }
        })
        .await
        .unwrap();

        assert_eq!(result.value, "done");
        assert_eq!(result.retries, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn conflict_budget_is_bounded() {
        let calls = AtomicU32::new(0);
        let err = retry_on_conflict::<(), _, _>(
            "update",
            &RetryPolicy::immediate(3),
            Duration::from_secs(1),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::conflict("busy"))
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, StoreError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let err = retry_on_conflict::<(), _, _>(
            "update",
            &RetryPolicy::immediate(5),
            Duration::from_secs(1),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::transport("connection reset"))
            },
        )
        .await
        .unwrap_err();

        assert!(err.is_transport());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_calls_time_out() {
        let err = with_timeout("list_rows", Duration::from_secs(30), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, StoreError>(())
        })
        .await
        .unwrap_err();

        match err {
            StoreError::Timeout { operation, after } => {
                assert_eq!(operation, "list_rows");
                assert_eq!(after, Duration::from_secs(30));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
