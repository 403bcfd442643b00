#![forbid(unsafe_code)]

//! Media data model shared by every lyre crate.
//!
//! A [`Manifest`] is the already-parsed description of one piece of content:
//! the quality [`Representation`]s and the [`Segment`]s each of them is split
//! into. A [`SegmentTimeline`] places one or more manifests back to back
//! (windows) and answers "which segment covers this position".

mod error;
mod manifest;
mod timeline;
mod types;

pub use error::{CoreError, CoreResult};
pub use manifest::Manifest;
pub use timeline::{SegmentPosition, SegmentTimeline, Window};
pub use types::{ByteRange, Representation, Resolution, Segment};
