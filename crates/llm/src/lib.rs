//! LLM and speech integration
//!
//! Features:
//! - OpenAI-compatible chat completions (OpenAI or local servers)
//! - Retry with exponential backoff on transient failures
//! - OpenAI-compatible `/audio/speech` synthesis and `/audio/transcriptions`
//! - Adapters onto the core `LanguageModel` / `TextToSpeech` / `SpeechToText` traits

pub mod adapter;
pub mod backend;
pub mod factory;
pub mod stt;
pub mod tts;

pub use adapter::LanguageModelAdapter;
pub use backend::{GenerationOptions, GenerationResult, LlmBackend, OpenAIBackend, OpenAIConfig};
pub use factory::LlmFactory;
pub use stt::{OpenAIStt, SttConfig};
pub use tts::{OpenAITts, TtsConfig};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Network(_) | LlmError::Timeout)
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for tutor_core::Error {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout => tutor_core::Error::Timeout("LLM request".to_string()),
            other => tutor_core::Error::Llm(other.to_string()),
        }
    }
}
