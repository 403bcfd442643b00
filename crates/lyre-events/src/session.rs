use std::{fmt, time::Duration};

use lyre_core::Representation;
use serde::{Deserialize, Serialize};

/// Externally visible playback state.
///
/// `Empty`, `Loading`, `Buffered` and `Stalled` mirror the load controller;
/// `Ended` and `Failed` are terminal until the next seek (`Ended`) or
/// release (`Failed`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Created, not prepared.
    #[default]
    Idle,
    Empty,
    Loading,
    Buffered,
    Stalled,
    Ended,
    Failed,
}

impl PlaybackState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Failed)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Empty => "empty",
            Self::Loading => "loading",
            Self::Buffered => "buffered",
            Self::Stalled => "stalled",
            Self::Ended => "ended",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Session lifecycle notifications.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// Playback state transition.
    StateChanged {
        state: PlaybackState,
        /// Buffered media ahead of the playback position.
        buffered: Duration,
        /// Representation currently being loaded, if any.
        representation: Option<String>,
        play_when_ready: bool,
    },
    PlayWhenReadyChanged {
        play_when_ready: bool,
    },
    /// Playback jumped (seek, restore).
    PositionDiscontinuity {
        position: Duration,
        window: usize,
    },
    /// Timeline built or rebuilt.
    TimelineChanged {
        windows: usize,
        duration: Duration,
    },
    /// Representation set of a window changed.
    TracksChanged {
        window: usize,
        representations: Vec<Representation>,
    },
    Error {
        error: String,
        recoverable: bool,
    },
    Released,
}
