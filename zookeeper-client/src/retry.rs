//! Per-call retry loop for operations that lose their connection.

use std::future::Future;
use std::time::Duration;

use zookeeper_core::Result;

use crate::config::RetryConfig;
use crate::runtime::Runtime;

/// Computes the delay before retrying after attempt `attempt` (zero-based).
///
/// The delay is `initial_backoff * 2^attempt`, capped at `cap`.
pub fn backoff_delay(initial_backoff: Duration, attempt: u32, cap: Duration) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    std::cmp::min(initial_backoff.saturating_mul(factor), cap)
}

/// Runs `op` until it succeeds, fails with anything other than a lost
/// connection, or the retry budget is spent.
///
/// `op` receives the zero-based attempt index. At most `retries + 1`
/// attempts are made, and the outcome of the last one is returned. The
/// wait after a lost connection is capped by `session_timeout`, read
/// fresh before each wait.
pub async fn attempt<T, F, Fut, S>(
    runtime: &dyn Runtime,
    config: &RetryConfig,
    session_timeout: S,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
    S: Fn() -> Duration,
{
    let mut attempt = 0u32;

    loop {
        let result = op(attempt).await;

        let error = match result {
            Err(ref e) if e.is_connection_loss() => e,
            other => return other,
        };

        if attempt >= config.retries() {
            if config.retries() > 0 {
                tracing::warn!(
                    attempts = attempt + 1,
                    error = %error,
                    "retries exhausted"
                );
            }
            return result;
        }

        let delay = backoff_delay(config.initial_backoff(), attempt, session_timeout());
        tracing::debug!(
            attempt = attempt,
            backoff = ?delay,
            "connection lost, retrying"
        );

        runtime.sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfigBuilder;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};
    use zookeeper_core::{Exception, ExceptionCode, ZooKeeperError};

    #[derive(Default)]
    struct RecordingRuntime {
        delays: Mutex<Vec<Duration>>,
    }

    impl Runtime for RecordingRuntime {
        fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
            self.delays.lock().unwrap().push(duration);
            Box::pin(async {})
        }
    }

    fn retries(n: u32) -> RetryConfig {
        RetryConfigBuilder::new().retries(n).build().unwrap()
    }

    fn loss() -> ZooKeeperError {
        Exception::new(ExceptionCode::ConnectionLoss).into()
    }

    #[test]
    fn test_backoff_delay_doubles_and_caps() {
        let initial = Duration::from_millis(1000);
        let cap = Duration::from_secs(30);
        assert_eq!(backoff_delay(initial, 0, cap), Duration::from_millis(1000));
        assert_eq!(backoff_delay(initial, 1, cap), Duration::from_millis(2000));
        assert_eq!(backoff_delay(initial, 4, cap), Duration::from_millis(16000));
        assert_eq!(backoff_delay(initial, 5, cap), cap);
        assert_eq!(backoff_delay(initial, 40, cap), cap);
    }

    #[tokio::test]
    async fn test_success_is_not_retried() {
        let runtime = RecordingRuntime::default();
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);

        let value = attempt(&runtime, &retries(3), || Duration::from_secs(30), |_| {
            let counter = Arc::clone(&counter);
            async move {
                *counter.lock().unwrap() += 1;
                Ok::<_, ZooKeeperError>(7)
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 7);
        assert_eq!(*calls.lock().unwrap(), 1);
        assert!(runtime.delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let runtime = RecordingRuntime::default();
        let result: Result<()> = attempt(
            &runtime,
            &RetryConfig::default(),
            || Duration::from_secs(30),
            |_| async { Err(loss()) },
        )
        .await;

        assert!(result.unwrap_err().is_connection_loss());
        assert!(runtime.delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_losses_then_other_error_stops() {
        let runtime = RecordingRuntime::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);

        let result: Result<()> = attempt(&runtime, &retries(3), || Duration::from_secs(30), |n| {
            log.lock().unwrap().push(n);
            async move {
                if n < 3 {
                    Err(loss())
                } else {
                    Err(Exception::with_path(ExceptionCode::NoNode, "/x").into())
                }
            }
        })
        .await;

        assert_eq!(result.unwrap_err().code(), Some(ExceptionCode::NoNode));
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(
            *runtime.delays.lock().unwrap(),
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000),
            ]
        );
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_last_loss() {
        let runtime = RecordingRuntime::default();
        let seen = Arc::new(Mutex::new(0u32));
        let count = Arc::clone(&seen);

        let result: Result<()> = attempt(&runtime, &retries(2), || Duration::from_secs(30), |_| {
            *count.lock().unwrap() += 1;
            async { Err(loss()) }
        })
        .await;

        assert!(result.unwrap_err().is_connection_loss());
        assert_eq!(*seen.lock().unwrap(), 3);
        assert_eq!(runtime.delays.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_backoff_capped_by_session_timeout() {
        let runtime = RecordingRuntime::default();
        let result: Result<()> = attempt(
            &runtime,
            &retries(3),
            || Duration::from_millis(1500),
            |_| async { Err(loss()) },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(
            *runtime.delays.lock().unwrap(),
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(1500),
                Duration::from_millis(1500),
            ]
        );
    }
}
