use std::time::Duration;

use tracing::trace;

use crate::{
    AbrOptions, ThroughputSample, ThroughputSampleSource,
    error::{AbrError, AbrResult},
};

/// Trait for throughput estimation strategies.
///
/// Allows testing the metering path with mock estimators.
#[cfg_attr(
    any(test, feature = "test-utils"),
    unimock::unimock(api = EstimatorMock)
)]
pub trait Estimator {
    /// Estimated throughput in bits per second.
    fn estimate_bps(&self) -> u64;

    /// Push a new throughput sample for estimation.
    fn push_sample(&mut self, sample: ThroughputSample) -> AbrResult<()>;

    /// Whether at least one sample has been accepted.
    fn has_samples(&self) -> bool;
}

/// Dual EWMA throughput estimator.
///
/// Samples are weighted by their transfer time. The estimate is the lower of
/// a fast and a slow average, so drops are honoured quickly while short
/// spikes are damped.
#[derive(Clone, Debug)]
pub struct BandwidthEstimator {
    fast_ewma: Ewma,
    slow_ewma: Ewma,
    bytes_sampled: u64,
    default_bps: u64,
    min_sample_bytes: u64,
}

impl BandwidthEstimator {
    const MIN_DURATION_MS: f64 = 0.5;

    #[must_use]
    pub fn new(cfg: &AbrOptions) -> Self {
        Self {
            fast_ewma: Ewma::new(cfg.fast_half_life),
            slow_ewma: Ewma::new(cfg.slow_half_life),
            bytes_sampled: 0,
            default_bps: cfg.default_estimate_bps,
            min_sample_bytes: cfg.min_sample_bytes,
        }
    }

    /// Current smoothed estimate, or the configured default before any sample.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // estimate is finite and non-negative
    pub fn estimate(&self) -> u64 {
        if self.bytes_sampled == 0 {
            return self.default_bps;
        }
        let est = self
            .fast_ewma
            .get_estimate()
            .min(self.slow_ewma.get_estimate());
        est.max(0.0).round() as u64
    }

    /// Record `bytes` transferred in `elapsed` over the network.
    pub fn sample(&mut self, bytes: u64, elapsed: Duration) -> AbrResult<()> {
        self.push_sample(ThroughputSample::network(bytes, elapsed))
    }

    #[expect(clippy::cast_precision_loss)] // byte counts stay far below 2^52
    pub fn push_sample(&mut self, sample: ThroughputSample) -> AbrResult<()> {
        if sample.elapsed.is_zero() {
            return Err(AbrError::InvalidSample {
                bytes: sample.bytes,
                elapsed: sample.elapsed,
            });
        }
        if !matches!(sample.source, ThroughputSampleSource::Network) {
            return Ok(());
        }
        if sample.bytes < self.min_sample_bytes {
            trace!(bytes = sample.bytes, "sample below measurable size, ignored");
            return Ok(());
        }

        let dur_ms = (sample.elapsed.as_secs_f64() * 1000.0).max(Self::MIN_DURATION_MS);
        let bps = (sample.bytes as f64) * 8000.0 / dur_ms;
        let weight_secs = dur_ms / 1000.0;

        self.fast_ewma.add_sample(weight_secs, bps);
        self.slow_ewma.add_sample(weight_secs, bps);
        self.bytes_sampled = self.bytes_sampled.saturating_add(sample.bytes);
        trace!(bps, estimate = self.estimate(), "bandwidth sample");
        Ok(())
    }

    #[must_use]
    pub fn has_samples(&self) -> bool {
        self.bytes_sampled > 0
    }
}

impl Estimator for BandwidthEstimator {
    fn estimate_bps(&self) -> u64 {
        self.estimate()
    }

    fn push_sample(&mut self, sample: ThroughputSample) -> AbrResult<()> {
        self.push_sample(sample)
    }

    fn has_samples(&self) -> bool {
        self.has_samples()
    }
}

#[derive(Clone, Debug)]
struct Ewma {
    alpha: f64,
    last_estimate: f64,
    total_weight: f64,
}

impl Ewma {
    fn new(half_life: Duration) -> Self {
        Self {
            alpha: f64::exp(0.5_f64.ln() / half_life.as_secs_f64().max(0.001)),
            last_estimate: 0.0,
            total_weight: 0.0,
        }
    }

    fn add_sample(&mut self, weight: f64, val: f64) {
        let adj_alpha = self.alpha.powf(weight.max(0.0));
        let new_estimate = val * (1.0 - adj_alpha) + adj_alpha * self.last_estimate;
        self.last_estimate = new_estimate;
        self.total_weight += weight.max(0.0);
    }

    fn get_estimate(&self) -> f64 {
        if self.total_weight <= 0.0 {
            0.0
        } else {
            let zero_factor = 1.0 - self.alpha.powf(self.total_weight);
            self.last_estimate / zero_factor.max(1e-6)
        }
    }
}
