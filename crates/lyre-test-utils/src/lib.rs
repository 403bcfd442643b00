#![forbid(unsafe_code)]
#![expect(
    clippy::unwrap_used,
    reason = "test utility crate, unwraps are acceptable"
)]
#![expect(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    reason = "test utility crate, numeric casts are acceptable"
)]
#![expect(
    clippy::missing_panics_doc,
    reason = "test utility crate, panic documentation not needed"
)]

//! Shared test utilities for the lyre workspace.

pub mod fixtures;
pub mod rng;
pub mod source;

pub use fixtures::*;
pub use rng::*;
pub use source::ScriptedSource;

/// Install a `tracing` subscriber honouring `RUST_LOG`, once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
