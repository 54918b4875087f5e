//! Agent identifiers and the registry that resolves them

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tutor_config::AgentCatalog;
use tutor_core::LanguageModel;

use crate::agent::{PromptAgent, TutorAgent};
use crate::AgentError;

/// The specialized tutors a message can be routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// Structured lessons
    Teaching,
    /// Direct questions about English
    Qna,
    /// Word meanings and translations
    Vocabulary,
    /// Free conversation practice
    Conversation,
    /// Grammar and pronunciation correction
    Fixer,
}

impl AgentKind {
    pub const ALL: [AgentKind; 5] = [
        AgentKind::Teaching,
        AgentKind::Qna,
        AgentKind::Vocabulary,
        AgentKind::Conversation,
        AgentKind::Fixer,
    ];

    /// Where unclassifiable messages go
    pub const FALLBACK: AgentKind = AgentKind::Fixer;

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Teaching => "teaching",
            AgentKind::Qna => "qna",
            AgentKind::Vocabulary => "vocabulary",
            AgentKind::Conversation => "conversation",
            AgentKind::Fixer => "fixer",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        AgentKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| AgentError::UnknownAgent(s.to_string()))
    }
}

/// Resolves an [`AgentKind`] to its agent
pub struct AgentRegistry {
    agents: HashMap<AgentKind, Arc<dyn TutorAgent>>,
}

impl AgentRegistry {
    /// One prompt agent per kind; every kind must be in the catalog
    pub fn from_catalog(
        catalog: &AgentCatalog,
        llm: Arc<dyn LanguageModel>,
        default_model: &str,
        timeout: Duration,
    ) -> Result<Self, AgentError> {
        let mut agents: HashMap<AgentKind, Arc<dyn TutorAgent>> = HashMap::new();

        for kind in AgentKind::ALL {
            let definition = catalog.agent(kind.as_str()).ok_or_else(|| {
                AgentError::Configuration(format!("catalog has no '{}' agent", kind))
            })?;
            agents.insert(
                kind,
                Arc::new(PromptAgent::new(
                    kind,
                    definition.clone(),
                    llm.clone(),
                    default_model,
                    timeout,
                )),
            );
        }

        for name in catalog.agent_names() {
            if name.parse::<AgentKind>().is_err() {
                tracing::warn!(agent = name, "Catalog agent has no route and will never be selected");
            }
        }

        Ok(Self { agents })
    }

    /// Replace the agent registered for `agent.kind()`
    pub fn with_agent(mut self, agent: Arc<dyn TutorAgent>) -> Self {
        self.agents.insert(agent.kind(), agent);
        self
    }

    pub fn resolve(&self, kind: AgentKind) -> Result<Arc<dyn TutorAgent>, AgentError> {
        self.agents
            .get(&kind)
            .cloned()
            .ok_or_else(|| AgentError::UnknownAgent(kind.to_string()))
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentInput;
    use crate::response::AgentOutput;
    use async_trait::async_trait;
    use tutor_core::{ConversationType, GenerateRequest, GenerateResponse, Result};

    struct NullLlm;

    #[async_trait]
    impl LanguageModel for NullLlm {
        async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse> {
            Ok(GenerateResponse::text("from llm"))
        }

        fn model_name(&self) -> &str {
            "null"
        }
    }

    struct CannedAgent;

    #[async_trait]
    impl TutorAgent for CannedAgent {
        fn kind(&self) -> AgentKind {
            AgentKind::Vocabulary
        }

        async fn respond(&self, _input: &AgentInput<'_>) -> std::result::Result<AgentOutput, AgentError> {
            Ok(AgentOutput::Output {
                output: "dog is כלב".to_string(),
            })
        }
    }

    fn registry() -> AgentRegistry {
        let catalog = AgentCatalog::builtin().unwrap();
        AgentRegistry::from_catalog(&catalog, Arc::new(NullLlm), "m", Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_agent_kind_parse() {
        assert_eq!("Fixer".parse::<AgentKind>().unwrap(), AgentKind::Fixer);
        assert_eq!(" qna ".parse::<AgentKind>().unwrap(), AgentKind::Qna);
        assert!("grammar".parse::<AgentKind>().is_err());
        for kind in AgentKind::ALL {
            assert_eq!(kind.to_string().parse::<AgentKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_registry_covers_every_kind() {
        let registry = registry();
        assert_eq!(registry.len(), AgentKind::ALL.len());
        for kind in AgentKind::ALL {
            assert_eq!(registry.resolve(kind).unwrap().kind(), kind);
        }
    }

    #[test]
    fn test_missing_definition_rejected() {
        let mut catalog = AgentCatalog::builtin().unwrap();
        catalog.agents.retain(|a| a.name != "vocabulary");
        let result = AgentRegistry::from_catalog(&catalog, Arc::new(NullLlm), "m", Duration::from_secs(1));
        assert!(matches!(result, Err(AgentError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_with_agent_overrides() {
        let registry = registry().with_agent(Arc::new(CannedAgent));
        let agent = registry.resolve(AgentKind::Vocabulary).unwrap();

        let input = AgentInput {
            text: "what is dog?",
            student_name: "Avi",
            conversation_type: ConversationType::QnA,
            history: &[],
        };
        let output = agent.respond(&input).await.unwrap();
        assert_eq!(output.into_text(), "dog is כלב");
    }
}
