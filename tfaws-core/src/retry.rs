//! Retry an operation while it fails with a transient error

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

const MIN_DELAY: Duration = Duration::from_millis(500);
const MAX_DELAY: Duration = Duration::from_secs(10);

/// Run `op` until it succeeds, fails with an error `retryable` rejects, or
/// `timeout` elapses. After the timeout one last attempt is made and its
/// result returned, so the caller always sees a real API error.
pub async fn retry_when<T, E, F, Fut, P>(timeout: Duration, mut op: F, retryable: P) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let deadline = Instant::now() + timeout;
    let mut delay = MIN_DELAY;
    let mut attempt = 1u32;

    loop {
        match op().await {
            Err(e) if retryable(&e) => {
                if Instant::now() + delay >= deadline {
                    tokio::time::sleep_until(deadline).await;
                    log::debug!("retry timeout reached after {} attempts, trying once more", attempt);
                    return op().await;
                }
                log::debug!("attempt {} failed with a retryable error, retrying in {:?}", attempt, delay);
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Retry a lookup that returns `Ok(None)` while the object is not visible
/// yet, as happens right after creation on eventually consistent APIs.
pub async fn retry_when_not_found<T, E, F, Fut>(timeout: Duration, mut op: F) -> Result<Option<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let deadline = Instant::now() + timeout;
    let mut delay = MIN_DELAY;

    loop {
        match op().await {
            Ok(None) => {
                if Instant::now() + delay >= deadline {
                    tokio::time::sleep_until(deadline).await;
                    return op().await;
                }
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Conflict,
        Fatal,
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_returns_at_once() {
        let mut calls = 0;
        let result: Result<(), TestError> = retry_when(
            Duration::from_secs(60),
            || {
                calls += 1;
                std::future::ready(Err(TestError::Fatal))
            },
            |e| *e == TestError::Conflict,
        )
        .await;

        assert_eq!(result, Err(TestError::Fatal));
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_error_is_retried_until_success() {
        let mut calls = 0;
        let result = retry_when(
            Duration::from_secs(60),
            || {
                calls += 1;
                let r = if calls < 4 {
                    Err(TestError::Conflict)
                } else {
                    Ok(calls)
                };
                std::future::ready(r)
            },
            |e| *e == TestError::Conflict,
        )
        .await;

        assert_eq!(result, Ok(4));
    }

    #[tokio::test(start_paused = true)]
    async fn last_error_is_returned_after_timeout() {
        let started = Instant::now();
        let mut calls = 0;
        let result: Result<(), TestError> = retry_when(
            Duration::from_secs(5),
            || {
                calls += 1;
                std::future::ready(Err(TestError::Conflict))
            },
            |e| *e == TestError::Conflict,
        )
        .await;

        assert_eq!(result, Err(TestError::Conflict));
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        // 0s, 0.5s, 1.5s, 3.5s, then the final attempt at the deadline
        assert_eq!(calls, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_is_retried_until_visible() {
        let mut calls = 0;
        let result: Result<Option<&str>, TestError> = retry_when_not_found(Duration::from_secs(60), || {
            calls += 1;
            std::future::ready(Ok(if calls < 3 { None } else { Some("found") }))
        })
        .await;

        assert_eq!(result, Ok(Some("found")));
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_after_timeout_is_none() {
        let result: Result<Option<()>, TestError> =
            retry_when_not_found(Duration::from_secs(2), || std::future::ready(Ok(None))).await;
        assert_eq!(result, Ok(None));
    }
}
