use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Video frame size of a representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// One fixed-quality encoding of the content.
///
/// Immutable once parsed from a manifest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Representation {
    /// Identifier, unique within its manifest.
    pub id: String,
    /// Declared bandwidth in bits per second.
    pub bitrate_bps: u64,
    /// Frame size for video representations.
    pub resolution: Option<Resolution>,
    /// Codec string (e.g. "avc1.64001f,mp4a.40.2").
    pub codecs: Option<String>,
    /// Container mime type (e.g. "video/mp4").
    pub mime_type: Option<String>,
}

impl Representation {
    pub fn new<S: Into<String>>(id: S, bitrate_bps: u64) -> Self {
        Self {
            id: id.into(),
            bitrate_bps,
            resolution: None,
            codecs: None,
            mime_type: None,
        }
    }

    #[must_use]
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = Some(Resolution::new(width, height));
        self
    }

    #[must_use]
    pub fn with_codecs<S: Into<String>>(mut self, codecs: S) -> Self {
        self.codecs = Some(codecs.into());
        self
    }

    #[must_use]
    pub fn with_mime_type<S: Into<String>>(mut self, mime_type: S) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Byte range inside a resource, `offset..offset + length`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

impl ByteRange {
    #[must_use]
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Last byte covered by the range (inclusive), `None` for an empty range.
    #[must_use]
    pub fn last_byte(&self) -> Option<u64> {
        self.length
            .checked_sub(1)
            .map(|len| self.offset.saturating_add(len))
    }

    /// HTTP `Range` header value, `None` for an empty range.
    #[must_use]
    pub fn to_header_value(&self) -> Option<String> {
        self.last_byte()
            .map(|last| format!("bytes={}-{last}", self.offset))
    }
}

/// One downloadable chunk of a representation.
///
/// `start` is relative to the start of the manifest (window) it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub representation_id: String,
    pub index: usize,
    pub start: Duration,
    pub duration: Duration,
    pub uri: Url,
    pub byte_range: Option<ByteRange>,
}

impl Segment {
    #[must_use]
    pub fn end(&self) -> Duration {
        self.start + self.duration
    }
}
