use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use derive_setters::Setters;
use lyre_abr::{BandwidthMeter, ThroughputSample};
use lyre_core::Segment;
use lyre_events::{EventBus, LoadEvent};
use lyre_net::{DataSource, DataSourceExt, NetError};
use tokio::time::Instant;
use tracing::trace;

use crate::{config::SessionConfig, manifest::ManifestLoader};

/// Collaborators a session is built from.
///
/// The bandwidth meter is explicit: pass the same meter to several sessions to
/// share one estimate, or a fresh one to start from the configured default.
#[derive(Clone, Setters)]
#[setters(prefix = "with_", strip_option)]
pub struct PlaybackContext {
    pub meter: BandwidthMeter,
    /// When `None`, the session creates its own bus.
    #[setters(rename = "with_events")]
    pub bus: Option<EventBus>,
    #[setters(skip)]
    pub source: Arc<dyn DataSource>,
    #[setters(skip)]
    pub manifests: Arc<dyn ManifestLoader>,
}

impl PlaybackContext {
    pub fn new(source: Arc<dyn DataSource>, manifests: Arc<dyn ManifestLoader>) -> Self {
        Self {
            meter: BandwidthMeter::default(),
            bus: None,
            source,
            manifests,
        }
    }

    /// Data source a session fetches through: metered attempts, optionally
    /// bounded in time, retried per the session's policy.
    pub(crate) fn fetch_source(
        &self,
        bus: &EventBus,
        config: &SessionConfig,
    ) -> Arc<dyn DataSource> {
        let metered =
            MeteredSource::new(Arc::clone(&self.source), self.meter.clone(), bus.clone());
        let attempt: Arc<dyn DataSource> = match config.fetch_timeout {
            Some(timeout) => Arc::new(metered.with_timeout(timeout)),
            None => Arc::new(metered),
        };
        Arc::new(attempt.with_retry(config.retry.clone()))
    }
}

/// Feeds every completed transfer of the wrapped source into a
/// [`BandwidthMeter`].
pub struct MeteredSource<S> {
    inner: S,
    meter: BandwidthMeter,
    bus: EventBus,
}

impl<S: DataSource> MeteredSource<S> {
    pub fn new(inner: S, meter: BandwidthMeter, bus: EventBus) -> Self {
        Self { inner, meter, bus }
    }
}

#[async_trait]
impl<S: DataSource> DataSource for MeteredSource<S> {
    async fn fetch(&self, segment: &Segment) -> Result<Bytes, NetError> {
        let started = Instant::now();
        let bytes = self.inner.fetch(segment).await?;
        let sample = ThroughputSample::network(bytes.len() as u64, started.elapsed());

        // Rejected samples are logged by the meter and otherwise ignored.
        if self.meter.record(sample).is_ok() {
            if let Some(bps) = sample.bits_per_second() {
                trace!(uri = %segment.uri, bps, "throughput sample");
                self.bus.publish(LoadEvent::ThroughputSample {
                    bits_per_second: rounded_bps(bps),
                });
            }
        }
        Ok(bytes)
    }
}

// Rate is finite and non-negative.
#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn rounded_bps(bps: f64) -> u64 {
    bps.round() as u64
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use lyre_abr::{AbrError, EstimatorMock};
    use lyre_events::Event;
    use lyre_test_utils::{KBPS, ScriptedSource, abr_ladder};
    use unimock::{MockFn, Unimock, matching};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn transfers_feed_the_meter() {
        let manifest = abr_ladder(1);
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let meter = BandwidthMeter::default();
        let source = MeteredSource::new(
            ScriptedSource::new(2_000 * KBPS).with_manifest(&manifest),
            meter.clone(),
            bus,
        );

        source
            .fetch(manifest.segment("1500k", 0).unwrap())
            .await
            .unwrap();

        assert!(meter.has_samples());
        assert_eq!(meter.estimate(), 2_000 * KBPS);
        assert_eq!(
            rx.recv().await.unwrap(),
            Event::Load(LoadEvent::ThroughputSample {
                bits_per_second: 2_000 * KBPS
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn instant_transfer_is_not_published() {
        let manifest = abr_ladder(1);
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let mock = Unimock::new(
            EstimatorMock::push_sample
                .next_call(matching!(_))
                .returns(Err(AbrError::InvalidSample {
                    bytes: 0,
                    elapsed: Duration::ZERO,
                })),
        );
        // Unbounded bandwidth: the transfer takes no time at all.
        let source = MeteredSource::new(
            ScriptedSource::new(u64::MAX).with_manifest(&manifest),
            BandwidthMeter::with_estimator(mock),
            bus,
        );

        source
            .fetch(manifest.segment("500k", 0).unwrap())
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
    }
}
