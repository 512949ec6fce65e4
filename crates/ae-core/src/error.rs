//! Shared error type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),
}

pub type CoreResult<T> = Result<T, CoreError>;
