#![forbid(unsafe_code)]

//! Unified event bus for the lyre playback pipeline.

mod bus;
mod event;
mod load;
mod session;

pub use bus::EventBus;
pub use event::Event;
pub use load::LoadEvent;
pub use session::{PlaybackState, SessionEvent};
