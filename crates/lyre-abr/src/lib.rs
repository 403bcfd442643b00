//! Adaptive Bitrate (ABR) building blocks.
//!
//! - [`BandwidthEstimator`]: smoothed network throughput from completed transfers.
//! - [`BandwidthMeter`]: cloneable, explicitly owned handle sharing one estimator
//!   between the components (and sessions) that feed and read it.
//! - [`TrackSelector`]: picks the representation for the next segment with
//!   hysteresis against oscillation.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use lyre_abr::{AbrOptions, BandwidthEstimator, TrackSelector};
//! use lyre_core::Representation;
//!
//! let opts = AbrOptions::default();
//! let mut estimator = BandwidthEstimator::new(&opts);
//! estimator.sample(250_000, Duration::from_secs(1)).unwrap();
//!
//! let ladder = vec![
//!     Representation::new("low", 500_000),
//!     Representation::new("mid", 1_500_000),
//! ];
//! let mut selector = TrackSelector::new(opts);
//! let decision = selector.select(&ladder, estimator.estimate(), None).unwrap();
//! assert_eq!(decision.representation.id, "mid");
//! ```

#![forbid(unsafe_code)]

mod error;
mod estimator;
mod meter;
mod selector;
mod types;

pub use error::{AbrError, AbrResult};
#[cfg(any(test, feature = "test-utils"))]
pub use estimator::EstimatorMock;
pub use estimator::{BandwidthEstimator, Estimator};
pub use meter::BandwidthMeter;
pub use selector::{AbrDecision, AbrReason, TrackSelector};
pub use types::{AbrMode, AbrOptions, ThroughputSample, ThroughputSampleSource};
