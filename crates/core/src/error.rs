//! Error types shared across the workspace

use thiserror::Error;

/// Core error type
///
/// Every crate converts its own error enum into this one at the crate
/// boundary so callers can log the cause before degrading.
#[derive(Error, Debug)]
pub enum Error {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("STT error: {0}")]
    Stt(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Short machine-readable kind, used as a metrics/log label
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Llm(_) => "llm",
            Error::Tts(_) => "tts",
            Error::Stt(_) => "stt",
            Error::Store(_) => "store",
            Error::NotFound(_) => "not_found",
            Error::Validation(_) => "validation",
            Error::Audio(_) => "audio",
            Error::Timeout(_) => "timeout",
            Error::Serialization(_) => "serialization",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
