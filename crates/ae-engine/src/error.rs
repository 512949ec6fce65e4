use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("hardware unavailable: {0}")]
    HardwareUnavailable(String),

    #[error("stream disconnected: {0}")]
    StreamDisconnected(String),

    #[error("audio error: {0}")]
    Audio(#[from] ae_audio::AudioError),
}

pub type EngineResult<T> = Result<T, EngineError>;
