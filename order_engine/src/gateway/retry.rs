use std::{future::Future, time::Duration};

use log::*;

use crate::gateway::GatewayError;

/// Fixed-interval retry. `max_attempts` counts the first call, so a policy of 3 makes at most 3 calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, wait: Duration::from_millis(100) }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, wait: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), wait }
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self { max_attempts: 1, wait: Duration::ZERO }
    }

    /// Calls `f` until it succeeds or the attempts run out, sleeping `wait` between attempts. The last error is
    /// returned.
    pub async fn run<T, F, Fut>(&self, mut f: F) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) if attempt < attempts => {
                    debug!("💳️ Gateway call failed (attempt {attempt}/{attempts}): {e}. Retrying in {:?}", self.wait);
                    attempt += 1;
                    tokio::time::sleep(self.wait).await;
                },
                Err(e) => {
                    warn!("💳️ Gateway call failed after {attempts} attempts: {e}");
                    return Err(e);
                },
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let result = policy
            .run(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(GatewayError::Transport(format!("attempt {n}")))
                } else {
                    Ok(n)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_with_last_error() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let result: Result<(), _> = policy
            .run(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(GatewayError::Transport(format!("attempt {n}")))
            })
            .await;
        assert!(matches!(result, Err(GatewayError::Transport(msg)) if msg == "attempt 3"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn no_retry_calls_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::no_retry()
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(GatewayError::Rejected("nope".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
