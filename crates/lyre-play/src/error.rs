use lyre_abr::AbrError;
use lyre_core::CoreError;
use lyre_net::NetError;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlayError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Net(#[from] NetError),

    #[error(transparent)]
    Abr(#[from] AbrError),

    #[error("session not prepared")]
    NotPrepared,

    #[error("session already prepared")]
    AlreadyPrepared,

    #[error("session released")]
    Released,

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("window {window} out of range (timeline has {windows})")]
    WindowOutOfRange { window: usize, windows: usize },

    #[error("failed to load manifest {uri}: {reason}")]
    ManifestLoad { uri: Url, reason: String },
}

pub type PlayResult<T> = Result<T, PlayError>;
