//! Timeout helpers.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::NauvooError;

/// Wrap a future with a timeout.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, NauvooError>>,
) -> Result<T, NauvooError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(NauvooError::Timeout(duration.as_millis() as u64)),
    }
}

/// A derived abort signal that fires after a duration unless dropped first.
///
/// Used for per-step and total-run timeouts: the scheduled abort is cleared
/// (the timer task aborted) when the guard goes out of scope.
pub struct AbortAfter {
    token: CancellationToken,
    timer: tokio::task::JoinHandle<()>,
}

impl AbortAfter {
    /// Derive a child token from `parent` that cancels after `duration`.
    pub fn new(parent: &CancellationToken, duration: Duration) -> Self {
        let token = parent.child_token();
        let trigger = token.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            trigger.cancel();
        });
        Self { token, timer }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for AbortAfter {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn with_timeout_passes_through_fast_futures() {
        let result = with_timeout(Duration::from_secs(1), async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn with_timeout_fails_slow_futures() {
        let result = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(42)
        })
        .await;
        assert!(matches!(result, Err(NauvooError::Timeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn abort_after_fires_unless_dropped() {
        let parent = CancellationToken::new();
        let guard = AbortAfter::new(&parent, Duration::from_millis(50));
        let token = guard.token();
        assert!(!token.is_cancelled());

        tokio::time::sleep(Duration::from_millis(60)).await;
        tokio::task::yield_now().await;
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn abort_after_cleared_on_drop() {
        let parent = CancellationToken::new();
        let guard = AbortAfter::new(&parent, Duration::from_millis(50));
        let token = guard.token();
        drop(guard);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!token.is_cancelled());
    }
}
