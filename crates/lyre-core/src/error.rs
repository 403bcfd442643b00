use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),
    #[error("Window {window} out of range (timeline has {windows})")]
    WindowOutOfRange { window: usize, windows: usize },
}

impl CoreError {
    pub(crate) fn invalid<S: Into<String>>(reason: S) -> Self {
        Self::InvalidManifest(reason.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
