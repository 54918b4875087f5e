//! OpenAI-compatible chat completion backend
//!
//! Talks to OpenAI or any local server exposing `/chat/completions`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tutor_config::constants::{endpoints, timeouts};
use tutor_core::{FinishReason, Message};

use crate::LlmError;

/// Per-call overrides of the backend defaults
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptions {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// LLM generation result
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub text: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_time_ms: u64,
    pub finish_reason: FinishReason,
}

/// LLM Backend trait
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate a response
    async fn generate(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<GenerationResult, LlmError>;

    /// Check if model is available
    async fn is_available(&self) -> bool;

    /// Default model name
    fn model_name(&self) -> &str;
}

/// Connection settings for an OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`
    pub endpoint: String,
    /// Sent as a bearer token; may be empty for local servers
    pub api_key: String,
    /// Used when a request does not name its own model
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: f32,
    /// Per HTTP attempt
    pub timeout: Duration,
    /// Extra attempts after the first transient failure
    pub max_retries: u32,
    /// Wait before the first retry; doubled for each further retry
    pub initial_backoff: Duration,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            endpoint: endpoints::OPENAI_BASE_URL.to_string(),
            api_key: String::new(),
            model: endpoints::AGENT_MODEL.to_string(),
            max_tokens: None,
            temperature: 0.7,
            timeout: Duration::from_millis(timeouts::LLM_MS),
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
        }
    }
}

impl OpenAIConfig {
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    /// Self-hosted server speaking the same protocol; no key needed
    pub fn local(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            ..Default::default()
        }
    }
}

pub struct OpenAIBackend {
    config: OpenAIConfig,
    client: Client,
}

impl OpenAIBackend {
    pub fn new(config: OpenAIConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() && !is_local(&config.endpoint) {
            return Err(LlmError::Configuration(format!(
                "an API key is required for {}",
                config.endpoint
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }

    fn build_request(&self, messages: &[Message], options: &GenerationOptions) -> OpenAIChatRequest {
        OpenAIChatRequest {
            model: options
                .model
                .clone()
                .unwrap_or_else(|| self.config.model.clone()),
            messages: messages
                .iter()
                .map(|m| OpenAIMessage {
                    role: m.role.as_str(),
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: options.max_tokens.or(self.config.max_tokens),
            temperature: Some(options.temperature.unwrap_or(self.config.temperature)),
        }
    }

    /// One HTTP attempt. Throttling and 5xx come back as `Network` so the
    /// caller retries them; any other non-success status is final.
    async fn send_once(&self, request: &OpenAIChatRequest) -> Result<OpenAIChatResponse, LlmError> {
        let response = self
            .client
            .post(self.chat_url())
            .headers(build_headers(&self.config.api_key))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| LlmError::InvalidResponse(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Err(LlmError::Network(format!("{} from upstream: {}", status, body)))
        } else {
            Err(LlmError::Api(format!("{}: {}", status, body)))
        }
    }

    /// `send_once` with exponential backoff between transient failures
    async fn send_with_retry(
        &self,
        request: &OpenAIChatRequest,
    ) -> Result<OpenAIChatResponse, LlmError> {
        let mut backoff = self.config.initial_backoff;
        let mut attempt = 0;

        loop {
            match self.send_once(request).await {
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        max_retries = self.config.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "Chat completion failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAIBackend {
    async fn generate(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<GenerationResult, LlmError> {
        let start = Instant::now();
        let request = self.build_request(messages, options);

        let response = self.send_with_retry(&request).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;
        let usage = response.usage.unwrap_or_default();
        let total_time_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            model = %request.model,
            total_time_ms,
            completion_tokens = usage.completion_tokens,
            "Chat completion finished"
        );

        Ok(GenerationResult {
            text: choice.message.content.unwrap_or_default(),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_time_ms,
            finish_reason: match choice.finish_reason.as_deref() {
                Some("length") => FinishReason::Length,
                _ => FinishReason::Stop,
            },
        })
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/models", self.config.endpoint.trim_end_matches('/'));
        match self
            .client
            .get(&url)
            .headers(build_headers(&self.config.api_key))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

pub(crate) fn is_local(endpoint: &str) -> bool {
    ["http://localhost", "http://127.0.0.1", "http://0.0.0.0"]
        .iter()
        .any(|prefix| endpoint.starts_with(prefix))
}

/// Bearer auth plus JSON content type; the key is omitted when empty
pub(crate) fn build_headers(api_key: &str) -> HeaderMap {
    let mut headers = auth_headers(api_key);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers
}

/// Bearer auth only, for bodies that set their own content type (multipart)
pub(crate) fn auth_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if !api_key.is_empty() {
        match HeaderValue::from_str(&format!("Bearer {}", api_key)) {
            Ok(value) => {
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => tracing::warn!("API key contains characters not allowed in a header"),
        }
    }

    headers
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct OpenAIUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}
