use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use lyre_core::Segment;
use tokio::time::sleep;
use tracing::warn;
#[cfg(test)]
use unimock::unimock;

use crate::{error::NetError, traits::DataSource, types::RetryPolicy};

#[cfg_attr(test, unimock(api = RetryPolicyMock))]
pub trait RetryPolicyTrait: Send + Sync {
    /// Whether a failed `attempt` (0-based) should be followed by another one.
    fn should_retry(&self, error: &NetError, attempt: u32) -> bool;
    fn delay_for_attempt(&self, attempt: u32) -> Duration;
    fn max_attempts(&self) -> u32;
}

pub struct DefaultRetryPolicy {
    policy: RetryPolicy,
}

impl DefaultRetryPolicy {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

impl RetryPolicyTrait for DefaultRetryPolicy {
    fn should_retry(&self, error: &NetError, attempt: u32) -> bool {
        attempt < self.policy.max_retries && error.is_retryable()
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.policy.delay_for_attempt(attempt)
    }

    fn max_attempts(&self) -> u32 {
        self.policy.max_retries
    }
}

/// Retry decorator for [`DataSource`] implementations.
///
/// Non-retryable errors are returned as is; running out of attempts on a
/// retryable one yields [`NetError::RetryExhausted`].
pub struct RetrySource<S, P> {
    inner: S,
    retry_policy: P,
}

impl<S: DataSource, P: RetryPolicyTrait> RetrySource<S, P> {
    pub fn new(inner: S, retry_policy: P) -> Self {
        Self {
            inner,
            retry_policy,
        }
    }
}

#[async_trait]
impl<S: DataSource, P: RetryPolicyTrait> DataSource for RetrySource<S, P> {
    async fn fetch(&self, segment: &Segment) -> Result<Bytes, NetError> {
        let mut attempt = 0;
        loop {
            let error = match self.inner.fetch(segment).await {
                Ok(bytes) => return Ok(bytes),
                Err(error) => error,
            };
            if !error.is_retryable() {
                return Err(error);
            }
            if !self.retry_policy.should_retry(&error, attempt) {
                return Err(NetError::RetryExhausted {
                    max_retries: self.retry_policy.max_attempts(),
                    source: Box::new(error),
                });
            }

            attempt += 1;
            let delay = self.retry_policy.delay_for_attempt(attempt);
            warn!(
                uri = %segment.uri,
                attempt,
                delay_ms = delay.as_millis(),
                %error,
                "segment fetch failed, retrying"
            );
            sleep(delay).await;
        }
    }
}
