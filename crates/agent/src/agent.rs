//! Tutoring agent trait and the prompt-templated implementation

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tutor_config::{AgentDefinition, PromptContext};
use tutor_core::{ConversationType, GenerateRequest, LanguageModel, Message};

use crate::registry::AgentKind;
use crate::response::AgentOutput;
use crate::AgentError;

/// Everything an agent sees for one turn
#[derive(Debug, Clone)]
pub struct AgentInput<'a> {
    pub text: &'a str,
    pub student_name: &'a str,
    pub conversation_type: ConversationType,
    /// Prior turns of this conversation, oldest first
    pub history: &'a [Message],
}

/// A specialized tutor that answers one student utterance
///
/// # Example
///
/// ```ignore
/// struct EchoAgent;
///
/// #[async_trait]
/// impl TutorAgent for EchoAgent {
///     fn kind(&self) -> AgentKind { AgentKind::Conversation }
///     async fn respond(&self, input: &AgentInput<'_>) -> Result<AgentOutput, AgentError> {
///         Ok(AgentOutput::Text(input.text.to_string()))
///     }
/// }
/// ```
#[async_trait]
pub trait TutorAgent: Send + Sync {
    fn kind(&self) -> AgentKind;

    async fn respond(&self, input: &AgentInput<'_>) -> Result<AgentOutput, AgentError>;
}

/// Agent driven by a catalog prompt template
pub struct PromptAgent {
    kind: AgentKind,
    definition: AgentDefinition,
    llm: Arc<dyn LanguageModel>,
    default_model: String,
    timeout: Duration,
}

impl PromptAgent {
    pub fn new(
        kind: AgentKind,
        definition: AgentDefinition,
        llm: Arc<dyn LanguageModel>,
        default_model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            kind,
            definition,
            llm,
            default_model: default_model.into(),
            timeout,
        }
    }

    pub fn definition(&self) -> &AgentDefinition {
        &self.definition
    }

    fn build_request(&self, input: &AgentInput<'_>) -> GenerateRequest {
        let system = PromptContext::new(input.student_name, input.conversation_type)
            .substitute(&self.definition.prompt_template);

        let mut request = GenerateRequest::new(system)
            .with_history(input.history.iter().cloned())
            .with_user_message(input.text)
            .with_model(
                self.definition
                    .model
                    .clone()
                    .unwrap_or_else(|| self.default_model.clone()),
            );

        if let Some(temperature) = self.definition.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.definition.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        request
    }
}

#[async_trait]
impl TutorAgent for PromptAgent {
    fn kind(&self) -> AgentKind {
        self.kind
    }

    async fn respond(&self, input: &AgentInput<'_>) -> Result<AgentOutput, AgentError> {
        let request = self.build_request(input);
        let reply = complete(self.llm.as_ref(), request, self.timeout).await?;
        Ok(AgentOutput::from_reply(&reply))
    }
}

/// One completion call bounded by `timeout`
pub(crate) async fn complete(
    llm: &dyn LanguageModel,
    request: GenerateRequest,
    timeout: Duration,
) -> Result<String, AgentError> {
    let response = tokio::time::timeout(timeout, llm.generate(request))
        .await
        .map_err(|_| AgentError::Timeout(timeout.as_millis() as u64))??;
    Ok(response.text)
}
