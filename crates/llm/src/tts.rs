//! OpenAI-compatible speech synthesis (`POST {endpoint}/audio/speech`)

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tutor_config::constants::{endpoints, timeouts};
use tutor_core::{Error, Result, TextToSpeech};

use crate::backend::{build_headers, is_local};
use crate::LlmError;

#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub endpoint: String,
    pub api_key: String,
    /// `tts-1` or `tts-1-hd`
    pub model: String,
    pub voice: String,
    pub timeout: Duration,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: endpoints::OPENAI_BASE_URL.to_string(),
            api_key: String::new(),
            model: endpoints::TTS_MODEL.to_string(),
            voice: endpoints::TTS_VOICE.to_string(),
            timeout: Duration::from_millis(timeouts::TTS_MS),
        }
    }
}

impl TtsConfig {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }
}

/// Speech client returning MP3 bytes
pub struct OpenAITts {
    config: TtsConfig,
    client: Client,
}

impl OpenAITts {
    pub fn new(config: TtsConfig) -> std::result::Result<Self, LlmError> {
        if config.api_key.is_empty() && !is_local(&config.endpoint) {
            return Err(LlmError::Configuration(
                "API key required for remote speech endpoints".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn speech_url(&self) -> String {
        format!("{}/audio/speech", self.config.endpoint.trim_end_matches('/'))
    }

    fn build_request<'a>(&'a self, text: &'a str) -> SpeechRequest<'a> {
        SpeechRequest {
            model: &self.config.model,
            input: text,
            voice: &self.config.voice,
            response_format: "mp3",
        }
    }

    async fn request_audio(&self, text: &str) -> std::result::Result<Vec<u8>, LlmError> {
        let response = self
            .client
            .post(self.speech_url())
            .headers(build_headers(&self.config.api_key))
            .json(&self.build_request(text))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("TTS API error {}: {}", status, body)));
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl TextToSpeech for OpenAITts {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let audio = self.request_audio(text).await.map_err(|e| match e {
            LlmError::Timeout => Error::Timeout("speech synthesis".to_string()),
            other => Error::Tts(other.to_string()),
        })?;

        tracing::debug!(
            chars = text.len(),
            bytes = audio.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Speech synthesized"
        );

        Ok(audio)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}
