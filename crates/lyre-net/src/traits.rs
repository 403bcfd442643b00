use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use lyre_core::Segment;

use crate::{
    error::NetError,
    retry::{DefaultRetryPolicy, RetrySource},
    timeout::TimeoutSource,
    types::RetryPolicy,
};

/// Fetches the media bytes of one segment.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch(&self, segment: &Segment) -> Result<Bytes, NetError>;
}

#[async_trait]
impl<T: DataSource + ?Sized> DataSource for Arc<T> {
    async fn fetch(&self, segment: &Segment) -> Result<Bytes, NetError> {
        (**self).fetch(segment).await
    }
}

pub trait DataSourceExt: DataSource + Sized {
    /// Add timeout layer
    fn with_timeout(self, timeout: Duration) -> TimeoutSource<Self> {
        TimeoutSource::new(self, timeout)
    }

    /// Add retry layer
    fn with_retry(self, policy: RetryPolicy) -> RetrySource<Self, DefaultRetryPolicy> {
        RetrySource::new(self, DefaultRetryPolicy::new(policy))
    }
}

impl<T: DataSource> DataSourceExt for T {}
