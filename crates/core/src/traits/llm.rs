//! Language Model trait

use async_trait::async_trait;

use crate::{GenerateRequest, GenerateResponse, Result};

/// Language Model interface
///
/// # Example
///
/// ```ignore
/// let llm: Arc<dyn LanguageModel> = Arc::new(LanguageModelAdapter::new(backend));
/// let request = GenerateRequest::new("You are an English teacher")
///     .with_user_message("What does 'happy' mean?");
/// let response = llm.generate(request).await?;
/// println!("{}", response.text);
/// ```
#[async_trait]
pub trait LanguageModel: Send + Sync + 'static {
    /// Generate a completion for the request's messages
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse>;

    /// Get model name for logging
    fn model_name(&self) -> &str;

    /// Check if the model is reachable
    async fn is_available(&self) -> bool {
        true
    }
}
