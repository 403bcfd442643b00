//! Adaptive playback session.
//!
//! A [`PlaybackSession`] loads the manifests of a [`MediaSource`], builds a
//! segment timeline and keeps a forward buffer filled: [`LoadControl`] decides
//! when to fetch, the ABR selector decides which representation, and every
//! completed transfer feeds the shared [`lyre_abr::BandwidthMeter`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use lyre_net::{HttpSource, NetOptions};
//! use lyre_play::{PlaybackContext, PlaybackSession, SessionConfig, StaticManifests};
//! use url::Url;
//!
//! # async fn run(manifest: lyre_core::Manifest) -> Result<(), Box<dyn std::error::Error>> {
//! let uri = Url::parse("https://cdn.example/show/manifest.mpd")?;
//! let manifests = StaticManifests::new().with(uri.clone(), manifest);
//! let ctx = PlaybackContext::new(
//!     Arc::new(HttpSource::new(NetOptions::default())?),
//!     Arc::new(manifests),
//! );
//!
//! let session = PlaybackSession::new(ctx, SessionConfig::default())?;
//! let mut events = session.subscribe();
//! session.prepare(uri).await?;
//! session.play()?;
//! while let Ok(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod buffer;
mod config;
mod context;
mod error;
mod load_control;
mod manifest;
mod session;
mod snapshot;
mod worker;

pub use buffer::BufferState;
pub use config::SessionConfig;
pub use context::{MeteredSource, PlaybackContext};
pub use error::{PlayError, PlayResult};
pub use load_control::{LoadControl, LoadControlOptions, LoadState};
pub use manifest::{ManifestLoader, MediaSource, StaticManifests};
pub use session::PlaybackSession;
pub use snapshot::{PlaybackSnapshot, SessionStatus};
