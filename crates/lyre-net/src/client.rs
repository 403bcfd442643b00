use async_trait::async_trait;
use bytes::Bytes;
use lyre_core::Segment;
use reqwest::{Client, RequestBuilder, header::RANGE};
use tracing::trace;

use crate::{
    error::{NetError, NetResult},
    traits::DataSource,
    types::NetOptions,
};

/// [`DataSource`] over HTTP(S).
#[derive(Clone, Debug)]
pub struct HttpSource {
    inner: Client,
    options: NetOptions,
}

impl HttpSource {
    pub fn new(options: NetOptions) -> NetResult<Self> {
        let inner = Client::builder()
            .pool_max_idle_per_host(options.pool_max_idle_per_host)
            .build()?;
        Ok(Self { inner, options })
    }

    fn request(&self, segment: &Segment) -> RequestBuilder {
        let mut req = self
            .inner
            .get(segment.uri.clone())
            .timeout(self.options.request_timeout);
        if let Some(range) = segment.byte_range.and_then(|r| r.to_header_value()) {
            req = req.header(RANGE, range);
        }
        req
    }
}

#[async_trait]
impl DataSource for HttpSource {
    async fn fetch(&self, segment: &Segment) -> Result<Bytes, NetError> {
        let resp = self.request(segment).send().await?;
        let status = resp.status();

        // 206 is a success status, covered for ranged requests
        if !status.is_success() {
            return Err(NetError::http_status(
                status.as_u16(),
                segment.uri.to_string(),
            ));
        }

        let bytes = resp.bytes().await?;
        trace!(uri = %segment.uri, bytes = bytes.len(), "segment fetched");
        Ok(bytes)
    }
}
