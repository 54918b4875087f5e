//! English tutoring agents
//!
//! Features:
//! - Conversation-type aware classification routing to specialized agents
//! - Prompt-templated agents backed by a shared language model
//! - Per-conversation bounded history
//! - Phrase-level speech synthesis with a bounded FIFO cache
//! - Openings and end-of-conversation summaries

pub mod agent;
pub mod cache;
pub mod classifier;
pub mod history;
pub mod orchestrator;
pub mod registry;
pub mod response;
pub mod speech;

pub use agent::{AgentInput, PromptAgent, TutorAgent};
pub use cache::{normalize_key, PhraseCache};
pub use classifier::{parse_classification, Classification, ClassificationContext, Classifier};
pub use history::ConversationHistory;
pub use orchestrator::{
    ConversationSummary, OrchestratorConfig, OrchestratorDeps, RecordedExchange, ResponseMetadata,
    StartedConversation, TutorOrchestrator, TutorResponse,
};
pub use registry::{AgentKind, AgentRegistry};
pub use response::AgentOutput;
pub use speech::{concatenate_segments, split_into_phrases, SpeechConfig, SpeechSynthesizer};

use thiserror::Error;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Timed out after {0}ms")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Core(#[from] tutor_core::Error),
}

impl AgentError {
    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::ConversationNotFound(_) => "conversation_not_found",
            AgentError::UnknownAgent(_) => "unknown_agent",
            AgentError::Timeout(_) => "timeout",
            AgentError::Configuration(_) => "configuration",
            AgentError::Core(e) => e.kind(),
        }
    }
}

impl From<tutor_config::ConfigError> for AgentError {
    fn from(err: tutor_config::ConfigError) -> Self {
        AgentError::Configuration(err.to_string())
    }
}

impl From<AgentError> for tutor_core::Error {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Core(e) => e,
            AgentError::ConversationNotFound(id) => tutor_core::Error::NotFound(format!("conversation {}", id)),
            AgentError::Timeout(ms) => tutor_core::Error::Timeout(format!("{}ms", ms)),
            other => tutor_core::Error::Validation(other.to_string()),
        }
    }
}
