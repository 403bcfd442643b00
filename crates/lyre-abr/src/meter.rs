use std::{fmt, sync::Arc};

use parking_lot::Mutex;
use tracing::warn;

use crate::{AbrOptions, AbrResult, BandwidthEstimator, Estimator, ThroughputSample};

/// Shared handle to one bandwidth estimator.
///
/// Cloning shares the estimator. A host passes the same meter to consecutive
/// sessions to keep the estimate across them, or a fresh one to start over.
#[derive(Clone)]
pub struct BandwidthMeter {
    inner: Arc<Mutex<Box<dyn Estimator + Send>>>,
}

impl BandwidthMeter {
    #[must_use]
    pub fn new(cfg: &AbrOptions) -> Self {
        Self::with_estimator(BandwidthEstimator::new(cfg))
    }

    pub fn with_estimator<E: Estimator + Send + 'static>(estimator: E) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(estimator))),
        }
    }

    /// Current estimate in bits per second.
    #[must_use]
    pub fn estimate(&self) -> u64 {
        self.inner.lock().estimate_bps()
    }

    #[must_use]
    pub fn has_samples(&self) -> bool {
        self.inner.lock().has_samples()
    }

    /// Feed a completed transfer.
    ///
    /// Invalid samples are rejected with a diagnostic and leave the estimate untouched.
    pub fn record(&self, sample: ThroughputSample) -> AbrResult<()> {
        let result = self.inner.lock().push_sample(sample);
        if let Err(ref err) = result {
            warn!(%err, "bandwidth sample rejected");
        }
        result
    }
}

impl Default for BandwidthMeter {
    fn default() -> Self {
        Self::new(&AbrOptions::default())
    }
}

impl fmt::Debug for BandwidthMeter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BandwidthMeter")
            .field("estimate", &self.estimate())
            .finish()
    }
}
