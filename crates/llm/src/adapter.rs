//! Language Model adapter
//!
//! Bridges the LlmBackend trait to the core LanguageModel trait, carrying
//! the per-request model, temperature and token limit through.

use std::sync::Arc;

use async_trait::async_trait;
use tutor_core::{GenerateRequest, GenerateResponse, LanguageModel, Result, TokenUsage};

use crate::backend::{GenerationOptions, LlmBackend};

/// `LanguageModel` over any `LlmBackend`
///
/// ```ignore
/// let backend = OpenAIBackend::new(OpenAIConfig::openai(key, "gpt-3.5-turbo-0125"))?;
/// let llm: Arc<dyn LanguageModel> = Arc::new(LanguageModelAdapter::new(backend));
/// ```
pub struct LanguageModelAdapter {
    backend: Arc<dyn LlmBackend>,
    model_name: String,
}

impl LanguageModelAdapter {
    pub fn new<B: LlmBackend + 'static>(backend: B) -> Self {
        let model_name = backend.model_name().to_string();
        Self {
            backend: Arc::new(backend),
            model_name,
        }
    }

    pub fn from_arc(backend: Arc<dyn LlmBackend>) -> Self {
        let model_name = backend.model_name().to_string();
        Self { backend, model_name }
    }

    pub(crate) fn options(request: &GenerateRequest) -> GenerationOptions {
        GenerationOptions {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

#[async_trait]
impl LanguageModel for LanguageModelAdapter {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        let options = Self::options(&request);
        let result = self.backend.generate(&request.messages, &options).await?;

        Ok(GenerateResponse {
            text: result.text,
            finish_reason: result.finish_reason,
            usage: Some(TokenUsage {
                prompt_tokens: result.prompt_tokens,
                completion_tokens: result.completion_tokens,
                total_tokens: result.prompt_tokens + result.completion_tokens,
            }),
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn is_available(&self) -> bool {
        self.backend.is_available().await
    }
}
