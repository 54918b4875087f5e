//! OpenAI-compatible transcription (`POST {endpoint}/audio/transcriptions`)

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tutor_config::constants::{endpoints, timeouts};
use tutor_core::{AudioClip, Error, Result, SpeechToText};

use crate::backend::{auth_headers, is_local};
use crate::LlmError;

#[derive(Debug, Clone)]
pub struct SttConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            endpoint: endpoints::OPENAI_BASE_URL.to_string(),
            api_key: String::new(),
            model: endpoints::STT_MODEL.to_string(),
            timeout: Duration::from_millis(timeouts::STT_MS),
        }
    }
}

impl SttConfig {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }
}

/// Whisper-style client; uploads the clip as-is, no transcoding
pub struct OpenAIStt {
    config: SttConfig,
    client: Client,
}

impl OpenAIStt {
    pub fn new(config: SttConfig) -> std::result::Result<Self, LlmError> {
        if config.api_key.is_empty() && !is_local(&config.endpoint) {
            return Err(LlmError::Configuration(
                "API key required for remote transcription endpoints".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn transcription_url(&self) -> String {
        format!(
            "{}/audio/transcriptions",
            self.config.endpoint.trim_end_matches('/')
        )
    }

    fn build_form(&self, clip: &AudioClip) -> std::result::Result<Form, LlmError> {
        let part = Part::bytes(clip.bytes.clone())
            .file_name(clip.file_name.clone())
            .mime_str(&clip.mime_type)
            .map_err(|e| LlmError::Configuration(format!("bad audio mime type: {}", e)))?;

        Ok(Form::new()
            .part("file", part)
            .text("model", self.config.model.clone()))
    }

    async fn request_text(&self, clip: &AudioClip) -> std::result::Result<String, LlmError> {
        let response = self
            .client
            .post(self.transcription_url())
            .headers(auth_headers(&self.config.api_key))
            .multipart(self.build_form(clip)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("STT API error {}: {}", status, body)));
        }

        let transcription: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok(transcription.text)
    }
}

#[async_trait]
impl SpeechToText for OpenAIStt {
    async fn transcribe(&self, clip: &AudioClip) -> Result<String> {
        if clip.is_empty() {
            return Err(Error::Validation("audio clip is empty".to_string()));
        }

        let start = Instant::now();
        let text = self.request_text(clip).await.map_err(|e| match e {
            LlmError::Timeout => Error::Timeout("transcription".to_string()),
            other => Error::Stt(other.to_string()),
        })?;

        tracing::debug!(
            bytes = clip.bytes.len(),
            mime_type = %clip.mime_type,
            chars = text.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Audio transcribed"
        );

        Ok(text.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}
