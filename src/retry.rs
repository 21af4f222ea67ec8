//! Bounded retry loop for read operations that wait on eventual consistency.

use std::error::Error as StdError;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Outcome of one failed attempt: try again, or give up now.
#[derive(Debug, Error)]
pub enum RetryError {
    #[error("{0}")]
    Retryable(BoxError),
    #[error("{0}")]
    NonRetryable(BoxError),
}

impl RetryError {
    pub fn retryable(err: impl Into<BoxError>) -> Self {
        RetryError::Retryable(err.into())
    }

    pub fn non_retryable(err: impl Into<BoxError>) -> Self {
        RetryError::NonRetryable(err.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, RetryError::Retryable(_))
    }

    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        match self {
            RetryError::Retryable(err) | RetryError::NonRetryable(err) => err.as_ref(),
        }
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner().downcast_ref::<E>()
    }
}

#[derive(Debug, Error)]
pub enum RetryFailure {
    #[error("timeout while waiting for state to become consistent after {attempts} attempts: {last}")]
    Timeout { attempts: u32, last: BoxError },
    #[error("{0}")]
    Aborted(BoxError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5 * 60),
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

/// Runs `op` until it succeeds, fails non-retryably, or `policy.timeout`
/// elapses. The first attempt always runs.
pub async fn with_retries<F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<(), RetryFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), RetryError>>,
{
    let deadline = Instant::now() + policy.timeout;
    let mut delay = policy.min_delay;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let last = match op().await {
            Ok(()) => {
                tracing::debug!(attempts, "operation succeeded");
                return Ok(());
            }
            Err(RetryError::NonRetryable(err)) => return Err(RetryFailure::Aborted(err)),
            Err(RetryError::Retryable(err)) => err,
        };

        let now = Instant::now();
        if now >= deadline {
            return Err(RetryFailure::Timeout { attempts, last });
        }

        tracing::debug!(attempt = attempts, error = %last, delay_ms = delay.as_millis() as u64, "retrying");
        tokio::time::sleep(delay.min(deadline - now)).await;
        delay = (delay * 2).min(policy.max_delay);
    }
}
