//! Builds the chat, speech and transcription clients from settings

use std::sync::Arc;
use std::time::Duration;

use tutor_config::Settings;
use tutor_core::{LanguageModel, SpeechToText, TextToSpeech};

use crate::adapter::LanguageModelAdapter;
use crate::backend::{OpenAIBackend, OpenAIConfig};
use crate::stt::{OpenAIStt, SttConfig};
use crate::tts::{OpenAITts, TtsConfig};
use crate::LlmError;

pub struct LlmFactory;

impl LlmFactory {
    /// Chat-completions client for the configured endpoint
    pub fn language_model(settings: &Settings) -> Result<Arc<dyn LanguageModel>, LlmError> {
        let llm = &settings.llm;
        let config = OpenAIConfig {
            endpoint: llm.endpoint.clone(),
            api_key: llm.resolved_api_key().unwrap_or_default(),
            model: llm.model.clone(),
            temperature: llm.temperature,
            timeout: Duration::from_millis(llm.timeout_ms),
            max_retries: llm.max_retries,
            initial_backoff: Duration::from_millis(llm.initial_backoff_ms),
            ..Default::default()
        };

        tracing::info!(endpoint = %config.endpoint, model = %config.model, "Creating LLM backend");
        let backend = OpenAIBackend::new(config)?;
        Ok(Arc::new(LanguageModelAdapter::new(backend)))
    }

    /// Speech client; shares the LLM endpoint and key unless `tts.endpoint` is set
    pub fn text_to_speech(settings: &Settings) -> Result<Arc<dyn TextToSpeech>, LlmError> {
        let config = TtsConfig {
            endpoint: settings
                .tts
                .endpoint
                .clone()
                .unwrap_or_else(|| settings.llm.endpoint.clone()),
            api_key: settings.llm.resolved_api_key().unwrap_or_default(),
            model: settings.tts.model.clone(),
            voice: settings.tts.voice.clone(),
            timeout: Duration::from_millis(settings.tts.timeout_ms),
        };

        tracing::info!(model = %config.model, voice = %config.voice, "Creating TTS client");
        Ok(Arc::new(OpenAITts::new(config)?))
    }

    /// Transcription client; shares the LLM endpoint and key unless `stt.endpoint` is set
    pub fn speech_to_text(settings: &Settings) -> Result<Arc<dyn SpeechToText>, LlmError> {
        let config = SttConfig {
            endpoint: settings
                .stt
                .endpoint
                .clone()
                .unwrap_or_else(|| settings.llm.endpoint.clone()),
            api_key: settings.llm.resolved_api_key().unwrap_or_default(),
            model: settings.stt.model.clone(),
            timeout: Duration::from_millis(settings.stt.timeout_ms),
        };

        tracing::info!(model = %config.model, "Creating STT client");
        Ok(Arc::new(OpenAIStt::new(config)?))
    }
}
