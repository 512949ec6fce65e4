use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventError {
    #[error("invalid parameter: {0}")]
    InvalidParam(String),
}

pub type EventResult<T> = Result<T, EventError>;
