use std::time::Duration;

use lyre_events::PlaybackState;
use serde::{Deserialize, Serialize};

/// What a host persists across session teardown to resume later.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub window: usize,
    /// Offset from the start of `window`. May reach past its end, in which
    /// case playback resumes in a later window.
    pub position: Duration,
    pub play_when_ready: bool,
}

/// Latest observable state of a session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: PlaybackState,
    pub play_when_ready: bool,
    /// Global playback position.
    pub position: Duration,
    pub window: usize,
    /// Playback position inside `window`.
    pub window_position: Duration,
    pub buffered: Duration,
    /// Representation of the most recently scheduled segment.
    pub representation: Option<String>,
}

impl SessionStatus {
    #[must_use]
    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            window: self.window,
            position: self.window_position,
            play_when_ready: self.play_when_ready,
        }
    }
}
