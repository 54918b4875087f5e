//! Speech synthesis and recognition traits

use async_trait::async_trait;

use crate::{AudioClip, Result};

/// Speech-to-Text interface
///
/// Turns one recorded clip into plain text; no streaming.
#[async_trait]
pub trait SpeechToText: Send + Sync + 'static {
    async fn transcribe(&self, clip: &AudioClip) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// Text-to-Speech interface
///
/// Implementations return encoded audio (MP3) for a piece of plain text.
#[async_trait]
pub trait TextToSpeech: Send + Sync + 'static {
    /// Synthesize text to encoded audio bytes
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;

    /// Get model name for logging
    fn model_name(&self) -> &str;
}
