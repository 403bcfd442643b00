use std::time::Duration;

use lyre_abr::AbrReason;

/// Segment loading and adaptation notifications.
#[derive(Clone, Debug, PartialEq)]
pub enum LoadEvent {
    /// Whether a fetch is wanted (load controller in loading or stalled).
    LoadingChanged { is_loading: bool },
    SegmentStart {
        window: usize,
        segment_index: usize,
        representation: String,
    },
    SegmentComplete {
        window: usize,
        segment_index: usize,
        representation: String,
        bytes: u64,
        elapsed: Duration,
    },
    /// A completed fetch arrived after it was superseded (seek, release).
    SegmentDiscarded {
        window: usize,
        segment_index: usize,
    },
    /// Throughput of one network transfer.
    ThroughputSample { bits_per_second: u64 },
    RepresentationSwitched {
        from: Option<String>,
        to: String,
        reason: AbrReason,
    },
}
