use std::time::Duration;

use serde::{Deserialize, Serialize};

/// ABR mode selection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbrMode {
    /// Automatic bitrate adaptation (ABR enabled).
    #[default]
    Auto,
    /// Pin the representation with this id while the manifest declares it.
    /// Falls back to automatic selection when it is not available.
    Manual(String),
}

/// ABR (Adaptive Bitrate) configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AbrOptions {
    /// Estimate used before any sample was accepted (bits per second).
    pub default_estimate_bps: u64,
    /// Half-life of the fast moving average, in transfer time.
    pub fast_half_life: Duration,
    /// Transfers smaller than this are too noisy to measure throughput.
    pub min_sample_bytes: u64,
    /// ABR mode: Auto (adaptive) or Manual (pinned representation).
    pub mode: AbrMode,
    /// Fraction of the estimate a representation's bitrate may use.
    pub safety_margin: f64,
    /// Half-life of the slow moving average, in transfer time.
    pub slow_half_life: Duration,
    /// Consecutive qualifying decisions required before switching up.
    pub up_switch_segments: usize,
}

impl Default for AbrOptions {
    fn default() -> Self {
        Self {
            default_estimate_bps: 1_000_000,
            fast_half_life: Duration::from_secs(2),
            min_sample_bytes: 16_000,
            mode: AbrMode::default(),
            safety_margin: 0.75,
            slow_half_life: Duration::from_secs(10),
            up_switch_segments: 3,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ThroughputSampleSource {
    Network,
    Cache,
}

/// One completed transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThroughputSample {
    pub bytes: u64,
    pub elapsed: Duration,
    pub source: ThroughputSampleSource,
}

impl ThroughputSample {
    #[must_use]
    pub fn network(bytes: u64, elapsed: Duration) -> Self {
        Self {
            bytes,
            elapsed,
            source: ThroughputSampleSource::Network,
        }
    }

    /// Observed rate in bits per second, `None` for a zero-length interval.
    #[must_use]
    #[expect(clippy::cast_precision_loss)] // byte counts stay far below 2^52
    pub fn bits_per_second(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        (secs > 0.0).then(|| self.bytes as f64 * 8.0 / secs)
    }
}
