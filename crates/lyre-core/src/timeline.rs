use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::{
    error::{CoreError, CoreResult},
    manifest::Manifest,
    types::{Representation, Segment},
};

/// Address of one segment slot in a [`SegmentTimeline`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentPosition {
    pub window: usize,
    pub index: usize,
}

impl SegmentPosition {
    #[must_use]
    pub fn new(window: usize, index: usize) -> Self {
        Self { window, index }
    }
}

/// One manifest placed on the global timeline.
#[derive(Clone, Debug)]
pub struct Window {
    pub uri: Url,
    pub offset: Duration,
    pub manifest: Manifest,
}

impl Window {
    #[must_use]
    pub fn end(&self) -> Duration {
        self.offset + self.manifest.duration()
    }
}

/// Maps playback positions to downloadable segments.
///
/// Windows are laid out back to back; positions are global (window offset +
/// position inside the window).
#[derive(Clone, Debug)]
pub struct SegmentTimeline {
    windows: Vec<Window>,
}

impl SegmentTimeline {
    /// Lay out `manifests` in order. At least one manifest is required.
    pub fn new(manifests: Vec<(Url, Manifest)>) -> CoreResult<Self> {
        if manifests.is_empty() {
            return Err(CoreError::invalid("timeline needs at least one manifest"));
        }
        let mut offset = Duration::ZERO;
        let windows = manifests
            .into_iter()
            .map(|(uri, manifest)| {
                let window = Window {
                    uri,
                    offset,
                    manifest,
                };
                offset = window.end();
                window
            })
            .collect::<Vec<_>>();
        debug!(
            windows = windows.len(),
            duration_ms = offset.as_millis(),
            "timeline built"
        );
        Ok(Self { windows })
    }

    #[must_use]
    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    #[must_use]
    pub fn window(&self, window: usize) -> Option<&Window> {
        self.windows.get(window)
    }

    #[must_use]
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.windows.last().map_or(Duration::ZERO, Window::end)
    }

    /// Representations valid in `window`; empty when out of range.
    #[must_use]
    pub fn representations(&self, window: usize) -> &[Representation] {
        self.windows
            .get(window)
            .map_or(&[][..], |w| w.manifest.representations())
    }

    /// Segment slot covering global `position`, `None` at or past the end.
    #[must_use]
    pub fn locate(&self, position: Duration) -> Option<SegmentPosition> {
        let window = self.windows.iter().position(|w| position < w.end())?;
        let local = position.saturating_sub(self.windows[window].offset);
        self.windows[window]
            .manifest
            .segment_index_at(local)
            .map(|index| SegmentPosition { window, index })
    }

    /// Window containing global `position`, clamped to the last window.
    #[must_use]
    pub fn window_at(&self, position: Duration) -> usize {
        self.windows
            .iter()
            .position(|w| position < w.end())
            .unwrap_or(self.windows.len().saturating_sub(1))
    }

    /// Slot following `pos`, crossing into the next window when needed.
    #[must_use]
    pub fn next(&self, pos: SegmentPosition) -> Option<SegmentPosition> {
        let window = self.windows.get(pos.window)?;
        if pos.index + 1 < window.manifest.segment_count() {
            return Some(SegmentPosition::new(pos.window, pos.index + 1));
        }
        (pos.window + 1 < self.windows.len()).then(|| SegmentPosition::new(pos.window + 1, 0))
    }

    /// Global `(start, end)` of slot `pos`.
    #[must_use]
    pub fn bounds(&self, pos: SegmentPosition) -> Option<(Duration, Duration)> {
        let window = self.windows.get(pos.window)?;
        let (start, duration) = window.manifest.boundary(pos.index)?;
        let start = window.offset + start;
        Some((start, start + duration))
    }

    /// Segment of `representation_id` at slot `pos`.
    #[must_use]
    pub fn segment(&self, pos: SegmentPosition, representation_id: &str) -> Option<&Segment> {
        self.windows
            .get(pos.window)?
            .manifest
            .segment(representation_id, pos.index)
    }

    /// Global position of `local` inside `window`.
    pub fn global_position(&self, window: usize, local: Duration) -> CoreResult<Duration> {
        let w = self.windows.get(window).ok_or(CoreError::WindowOutOfRange {
            window,
            windows: self.windows.len(),
        })?;
        Ok(w.offset + local.min(w.manifest.duration()))
    }

    /// Replace the manifest of `window`, e.g. after a representation was withdrawn.
    ///
    /// The replacement must keep the segment layout so positions stay valid.
    pub fn replace_manifest(&mut self, window: usize, manifest: Manifest) -> CoreResult<()> {
        let windows = self.windows.len();
        let w = self
            .windows
            .get_mut(window)
            .ok_or(CoreError::WindowOutOfRange { window, windows })?;
        if !w.manifest.same_layout(&manifest) {
            return Err(CoreError::invalid(
                "manifest update changes the segment layout",
            ));
        }
        debug!(
            window,
            representations = manifest.representations().len(),
            "window manifest replaced"
        );
        w.manifest = manifest;
        Ok(())
    }
}
