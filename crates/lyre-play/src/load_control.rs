use std::time::Duration;

use derivative::Derivative;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Buffering state driven by buffered duration against two watermarks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadState {
    #[default]
    Empty,
    Loading,
    Buffered,
    Stalled,
}

#[derive(Clone, Debug, Derivative, PartialEq, Eq, Serialize, Deserialize)]
#[derivative(Default)]
pub struct LoadControlOptions {
    /// Resume loading when buffered media falls below this.
    #[derivative(Default(value = "Duration::from_secs(15)"))]
    pub low_watermark: Duration,
    /// Stop loading once buffered media exceeds this.
    #[derivative(Default(value = "Duration::from_secs(30)"))]
    pub high_watermark: Duration,
}

/// Decides when the session should fetch more media.
///
/// Transitions are reported as `Some(new_state)` by the mutating calls, `None`
/// when the state did not change.
#[derive(Clone, Debug)]
pub struct LoadControl {
    opts: LoadControlOptions,
    state: LoadState,
    last_buffered: Duration,
}

impl LoadControl {
    #[must_use]
    pub fn new(opts: LoadControlOptions) -> Self {
        Self {
            opts,
            state: LoadState::Empty,
            last_buffered: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn state(&self) -> LoadState {
        self.state
    }

    #[must_use]
    pub fn options(&self) -> &LoadControlOptions {
        &self.opts
    }

    /// Whether a segment fetch should be running.
    #[must_use]
    pub fn wants_data(&self) -> bool {
        matches!(self.state, LoadState::Loading | LoadState::Stalled)
    }

    /// Playback started: begin loading.
    pub fn start(&mut self) -> Option<LoadState> {
        match self.state {
            LoadState::Empty => self.transition(LoadState::Loading),
            _ => None,
        }
    }

    /// Re-evaluate after the buffer changed.
    ///
    /// `complete` means every segment of the timeline has been loaded.
    /// Stalling requires the buffer to have drained to zero since the last
    /// update while playing; an empty buffer right after a start or a reset is
    /// plain loading.
    pub fn update(
        &mut self,
        buffered: Duration,
        playing: bool,
        complete: bool,
    ) -> Option<LoadState> {
        let drained = playing && buffered.is_zero() && !self.last_buffered.is_zero();
        self.last_buffered = buffered;

        let next = match self.state {
            LoadState::Empty => return None,
            LoadState::Stalled if buffered.is_zero() => return None,
            LoadState::Stalled => LoadState::Loading,
            _ if drained && !complete => LoadState::Stalled,
            LoadState::Loading if complete || buffered > self.opts.high_watermark => {
                LoadState::Buffered
            }
            LoadState::Buffered if !complete && buffered < self.opts.low_watermark => {
                LoadState::Loading
            }
            state => state,
        };
        self.transition(next)
    }

    /// A segment fetch completed successfully.
    pub fn on_segment_loaded(&mut self) -> Option<LoadState> {
        match self.state {
            LoadState::Stalled => self.transition(LoadState::Loading),
            _ => None,
        }
    }

    /// Buffer was flushed (seek). Loading resumes if it had started.
    pub fn reset(&mut self) -> Option<LoadState> {
        self.last_buffered = Duration::ZERO;
        match self.state {
            LoadState::Empty => None,
            _ => self.transition(LoadState::Loading),
        }
    }

    fn transition(&mut self, next: LoadState) -> Option<LoadState> {
        if next == self.state {
            return None;
        }
        debug!(from = ?self.state, to = ?next, "load control transition");
        self.state = next;
        Some(next)
    }
}
