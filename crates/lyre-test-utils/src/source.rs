//! In-memory [`DataSource`] with simulated link bandwidth.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use lyre_core::{Manifest, Segment};
use lyre_net::{DataSource, NetError};
use parking_lot::Mutex;
use tracing::trace;
use url::Url;

#[derive(Default)]
struct Script {
    bandwidth_bps: u64,
    bitrates: HashMap<String, u64>,
    failures: VecDeque<NetError>,
    requests: Vec<Url>,
    active: usize,
    max_active: usize,
}

/// Serves every segment as `bitrate × duration` bytes, taking as long as the
/// current simulated bandwidth needs for that many bytes (tokio time, so
/// paused-clock tests are deterministic).
///
/// Cloning shares the script, so a test can keep a handle and change the
/// bandwidth while a session is fetching.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    script: Arc<Mutex<Script>>,
}

impl ScriptedSource {
    #[must_use]
    pub fn new(bandwidth_bps: u64) -> Self {
        let source = Self::default();
        source.set_bandwidth(bandwidth_bps);
        source
    }

    /// Learn the bitrates of `manifest`'s representations.
    #[must_use]
    pub fn with_manifest(self, manifest: &Manifest) -> Self {
        {
            let mut script = self.script.lock();
            for rep in manifest.representations() {
                script.bitrates.insert(rep.id.clone(), rep.bitrate_bps);
            }
        }
        self
    }

    pub fn set_bandwidth(&self, bandwidth_bps: u64) {
        self.script.lock().bandwidth_bps = bandwidth_bps.max(1);
    }

    /// Fail the next `count` fetches with `error`.
    pub fn fail_next(&self, count: usize, error: &NetError) {
        let mut script = self.script.lock();
        script
            .failures
            .extend(std::iter::repeat_n(error.clone(), count));
    }

    /// URIs of every fetch started so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<Url> {
        self.script.lock().requests.clone()
    }

    /// Highest number of fetches that were in progress at once.
    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.script.lock().max_active
    }

    /// Size the payload of `segment` would have.
    #[must_use]
    pub fn payload_len(&self, segment: &Segment) -> Option<u64> {
        let bitrate = *self.script.lock().bitrates.get(&segment.representation_id)?;
        Some((bitrate as f64 * segment.duration.as_secs_f64() / 8.0).round() as u64)
    }
}

struct ActiveGuard<'a>(&'a Mutex<Script>);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().active -= 1;
    }
}

#[async_trait]
impl DataSource for ScriptedSource {
    async fn fetch(&self, segment: &Segment) -> Result<Bytes, NetError> {
        let len = self.payload_len(segment);
        let (failure, bandwidth) = {
            let mut script = self.script.lock();
            script.requests.push(segment.uri.clone());
            script.active += 1;
            script.max_active = script.max_active.max(script.active);
            (script.failures.pop_front(), script.bandwidth_bps)
        };
        let _guard = ActiveGuard(&self.script);

        if let Some(error) = failure {
            trace!(uri = %segment.uri, %error, "scripted failure");
            return Err(error);
        }
        let Some(len) = len else {
            return Err(NetError::http_status(404, segment.uri.to_string()));
        };

        let latency = Duration::from_secs_f64(len as f64 * 8.0 / bandwidth as f64);
        tokio::time::sleep(latency).await;
        Ok(Bytes::from(vec![segment.index as u8; len as usize]))
    }
}
