use std::time::Duration;

use derivative::Derivative;
use derive_setters::Setters;
use lyre_abr::AbrOptions;
use lyre_net::RetryPolicy;

use crate::{error::PlayError, load_control::LoadControlOptions};

/// Configuration of a [`PlaybackSession`](crate::PlaybackSession).
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use lyre_play::{LoadControlOptions, SessionConfig};
///
/// let config = SessionConfig::default()
///     .with_fetch_timeout(Duration::from_secs(10))
///     .with_load(LoadControlOptions {
///         low_watermark: Duration::from_secs(10),
///         high_watermark: Duration::from_secs(20),
///     });
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, Derivative, Setters)]
#[derivative(Default)]
#[setters(prefix = "with_", strip_option)]
pub struct SessionConfig {
    /// Bandwidth estimation and representation selection.
    pub abr: AbrOptions,
    /// Buffering watermarks.
    pub load: LoadControlOptions,
    /// Backoff for failed segment fetches.
    pub retry: RetryPolicy,
    /// Bound on one fetch attempt. `None` leaves timeouts to the data source.
    pub fetch_timeout: Option<Duration>,
    /// Playback clock resolution.
    #[derivative(Default(value = "Duration::from_millis(100)"))]
    pub tick_interval: Duration,
    /// Capacity of the session event bus when the context brings none.
    #[derivative(Default(value = "256"))]
    pub events_capacity: usize,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), PlayError> {
        let load = &self.load;
        if load.low_watermark >= load.high_watermark {
            return Err(PlayError::InvalidConfig(format!(
                "low watermark {:?} must be below high watermark {:?}",
                load.low_watermark, load.high_watermark
            )));
        }
        if self.tick_interval.is_zero() {
            return Err(PlayError::InvalidConfig(
                "tick interval must be positive".to_string(),
            ));
        }
        if !(self.abr.safety_margin.is_finite() && self.abr.safety_margin > 0.0) {
            return Err(PlayError::InvalidConfig(format!(
                "safety margin {} must be positive",
                self.abr.safety_margin
            )));
        }
        if self.abr.up_switch_segments == 0 {
            return Err(PlayError::InvalidConfig(
                "up-switch hysteresis needs at least one segment".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SessionConfig::default();
        assert_eq!(config.load.low_watermark, Duration::from_secs(15));
        assert_eq!(config.load.high_watermark, Duration::from_secs(30));
        assert_eq!(config.tick_interval, Duration::from_millis(100));
        assert_eq!(config.fetch_timeout, None);
        assert!(config.validate().is_ok());
    }

    #[rstest]
    #[case::inverted_watermarks(SessionConfig::default().with_load(LoadControlOptions {
        low_watermark: Duration::from_secs(30),
        high_watermark: Duration::from_secs(15),
    }))]
    #[case::equal_watermarks(SessionConfig::default().with_load(LoadControlOptions {
        low_watermark: Duration::from_secs(20),
        high_watermark: Duration::from_secs(20),
    }))]
    #[case::zero_tick(SessionConfig::default().with_tick_interval(Duration::ZERO))]
    #[case::zero_margin(SessionConfig::default().with_abr(AbrOptions {
        safety_margin: 0.0,
        ..AbrOptions::default()
    }))]
    #[case::no_hysteresis(SessionConfig::default().with_abr(AbrOptions {
        up_switch_segments: 0,
        ..AbrOptions::default()
    }))]
    fn invalid_configs_are_rejected(#[case] config: SessionConfig) {
        assert!(matches!(
            config.validate(),
            Err(PlayError::InvalidConfig(_))
        ));
    }
}
