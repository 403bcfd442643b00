use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AbrError {
    #[error("Invalid bandwidth sample: {bytes} bytes in {elapsed:?}")]
    InvalidSample { bytes: u64, elapsed: Duration },
}

pub type AbrResult<T> = Result<T, AbrError>;
