//! Waiter - Poll a status until it reaches a target state
//!
//! AWS APIs that work asynchronously report progress through a status
//! field (an accelerator is `IN_PROGRESS` until it is `DEPLOYED`). A
//! [`StateChangeConf`] describes which statuses are expected on the way and
//! which ones end the wait, and [`StateChangeConf::wait_for_state`] drives a
//! refresh function with exponential backoff until one of them is reached.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::provider::ProviderError;

const INITIAL_WAIT: Duration = Duration::from_millis(100);
const MAX_WAIT: Duration = Duration::from_secs(10);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(180);
const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

/// Outcome of one refresh: the object and its status, or `None` when the
/// object does not exist (yet, or any more).
pub type Refreshed<T> = Option<(T, String)>;

#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("unexpected state '{state}', wanted target '{}'", expected.join(", "))]
    UnexpectedState {
        state: String,
        expected: Vec<String>,
    },

    #[error(
        "timeout while waiting for state to become '{}' (last state: '{last_state}', timeout: {timeout:?})",
        expected.join(", ")
    )]
    Timeout {
        last_state: String,
        expected: Vec<String>,
        timeout: Duration,
    },

    #[error("couldn't find resource ({retries} retries)")]
    NotFound { retries: u32 },

    #[error(transparent)]
    Refresh(#[from] ProviderError),
}

impl WaitError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }
}

impl From<WaitError> for ProviderError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::Refresh(inner) => inner,
            other => ProviderError::new(other.to_string()),
        }
    }
}

/// Description of a state transition to wait for
#[derive(Debug, Clone)]
pub struct StateChangeConf {
    /// States that are allowed while waiting
    pub pending: Vec<String>,
    /// States that end the wait successfully
    pub target: Vec<String>,
    pub timeout: Duration,
    /// Sleep before the first refresh
    pub delay: Duration,
    /// Lower bound for the backoff between refreshes
    pub min_poll_interval: Duration,
    /// Fixed interval between refreshes, replacing the backoff
    pub poll_interval: Option<Duration>,
    /// Consecutive "not found" refreshes tolerated while a target is expected
    pub not_found_checks: u32,
    /// Consecutive target observations needed before the wait succeeds
    pub continuous_target_occurence: u32,
}

impl StateChangeConf {
    pub fn new<P, T>(pending: &[P], target: &[T], timeout: Duration) -> Self
    where
        P: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            pending: pending.iter().map(|s| s.as_ref().to_string()).collect(),
            target: target.iter().map(|s| s.as_ref().to_string()).collect(),
            timeout,
            delay: Duration::ZERO,
            min_poll_interval: Duration::ZERO,
            poll_interval: None,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
            continuous_target_occurence: 1,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_min_poll_interval(mut self, interval: Duration) -> Self {
        self.min_poll_interval = interval;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    pub fn with_continuous_target_occurence(mut self, occurences: u32) -> Self {
        self.continuous_target_occurence = occurences.max(1);
        self
    }

    /// Refresh until a target state is reached
    ///
    /// Returns the object observed in the target state, or `None` when the
    /// target list is empty and the object disappeared (a delete wait).
    pub async fn wait_for_state<T, F, Fut>(&self, mut refresh: F) -> Result<Option<T>, WaitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Refreshed<T>, ProviderError>>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut last_state = String::new();
        let mut not_found_ticks = 0u32;
        let mut target_occurence = 0u32;
        let mut wait = INITIAL_WAIT;

        if !self.sleep_before_deadline(self.delay, deadline).await {
            return Err(self.timeout_error(last_state));
        }

        loop {
            match refresh().await? {
                None if self.target.is_empty() => {
                    target_occurence += 1;
                    if target_occurence >= self.continuous_target_occurence {
                        return Ok(None);
                    }
                }
                None => {
                    not_found_ticks += 1;
                    if not_found_ticks > self.not_found_checks {
                        return Err(WaitError::NotFound {
                            retries: not_found_ticks,
                        });
                    }
                    log::debug!(
                        "resource not found while waiting ({}/{})",
                        not_found_ticks,
                        self.not_found_checks
                    );
                }
                Some((object, state)) => {
                    not_found_ticks = 0;
                    log::debug!("waiting for state {:?}, current state: {}", self.target, state);

                    if self.target.iter().any(|t| *t == state) {
                        target_occurence += 1;
                        if target_occurence >= self.continuous_target_occurence {
                            return Ok(Some(object));
                        }
                    } else if self.pending.iter().any(|p| *p == state) {
                        target_occurence = 0;
                    } else if !self.pending.is_empty() {
                        return Err(WaitError::UnexpectedState {
                            state,
                            expected: self.target.clone(),
                        });
                    }
                    last_state = state;
                }
            }

            // Backoff grows only while no target state has been observed
            if target_occurence == 0 {
                wait *= 2;
            }
            wait = match self.poll_interval {
                Some(interval) if !interval.is_zero() && interval < MAX_POLL_INTERVAL => interval,
                _ => wait.max(self.min_poll_interval).min(MAX_WAIT.max(self.min_poll_interval)),
            };

            if !self.sleep_before_deadline(wait, deadline).await {
                return Err(self.timeout_error(last_state));
            }
        }
    }

    /// Sleep for `duration`, or until `deadline` if that comes first.
    /// Returns false when the deadline was reached.
    async fn sleep_before_deadline(&self, duration: Duration, deadline: Instant) -> bool {
        let now = Instant::now();
        if now + duration >= deadline {
            tokio::time::sleep_until(deadline).await;
            return false;
        }
        tokio::time::sleep(duration).await;
        true
    }

    fn timeout_error(&self, last_state: String) -> WaitError {
        WaitError::Timeout {
            last_state,
            expected: self.target.clone(),
            timeout: self.timeout,
        }
    }
}
