use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use lyre_core::Segment;
use tracing::debug;

use crate::{error::NetError, traits::DataSource};

/// Timeout decorator for [`DataSource`] implementations.
///
/// Bounds the whole transfer, not only the response headers.
pub struct TimeoutSource<S> {
    inner: S,
    timeout: Duration,
}

impl<S: DataSource> TimeoutSource<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<S: DataSource> DataSource for TimeoutSource<S> {
    async fn fetch(&self, segment: &Segment) -> Result<Bytes, NetError> {
        tokio::time::timeout(self.timeout, self.inner.fetch(segment))
            .await
            .map_err(|_| {
                debug!(uri = %segment.uri, timeout_ms = self.timeout.as_millis(), "fetch timed out");
                NetError::Timeout
            })?
    }
}
