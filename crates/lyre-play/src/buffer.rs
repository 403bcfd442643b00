use std::time::Duration;

/// Playback position and the end of contiguous buffered media, both global.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferState {
    position: Duration,
    buffered_end: Duration,
}

impl BufferState {
    #[must_use]
    pub fn new(position: Duration) -> Self {
        Self {
            position,
            buffered_end: position,
        }
    }

    #[must_use]
    pub fn position(&self) -> Duration {
        self.position
    }

    #[must_use]
    pub fn buffered_end(&self) -> Duration {
        self.buffered_end
    }

    /// Media buffered ahead of the playback position.
    #[must_use]
    pub fn buffered(&self) -> Duration {
        self.buffered_end.saturating_sub(self.position)
    }

    /// Extend buffered media up to `end`.
    pub fn append(&mut self, end: Duration) {
        self.buffered_end = self.buffered_end.max(end);
    }

    /// Play `elapsed` of buffered media; returns how much was actually played.
    pub fn consume(&mut self, elapsed: Duration) -> Duration {
        let played = elapsed.min(self.buffered());
        self.position += played;
        played
    }

    /// Drop buffered media and move to `position`.
    pub fn flush(&mut self, position: Duration) {
        self.position = position;
        self.buffered_end = position;
    }
}
