//! Agent catalog: prompt templates for agents, classifiers, openings and summaries
//!
//! The catalog is a versioned configuration record. A default is compiled into
//! the binary from `catalog/default_agents.yaml`; deployments can point
//! `agents.catalog_path` at their own YAML file with the same shape.
//!
//! Templates may contain these placeholders:
//! - `{{user.firstName}}` - the student's first name
//! - `{{conversationType}}` - `QnA`, `Test`, `Free` or `Teach`
//! - `{{transcript}}` - conversation transcript (summary prompt only)

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tutor_core::ConversationType;

use crate::constants::fallbacks;
use crate::ConfigError;

const BUILTIN_CATALOG: &str = include_str!("../catalog/default_agents.yaml");

/// Agent every catalog must define; unroutable messages land here
pub const FALLBACK_AGENT: &str = "fixer";

/// A specialized tutoring agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentDefinition {
    pub name: String,
    pub description: String,
    pub prompt_template: String,
    /// Overrides `llm.model`
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// A single-shot prompt with optional inference overrides
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptTemplate {
    pub prompt_template: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// Routing prompt sent to the classification call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifierDefinition {
    pub prompt_template: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_classifier_temperature")]
    pub temperature: f32,
    #[serde(default = "default_classifier_max_tokens")]
    pub max_tokens: u32,
}

fn default_classifier_temperature() -> f32 {
    0.3
}

fn default_classifier_max_tokens() -> u32 {
    100
}

/// Classifier prompts by conversation mode
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifierSet {
    /// Used for Teach and Test conversations
    pub general: ClassifierDefinition,
    pub qna: ClassifierDefinition,
    pub free: ClassifierDefinition,
}

impl ClassifierSet {
    pub fn for_type(&self, conversation_type: ConversationType) -> &ClassifierDefinition {
        match conversation_type {
            ConversationType::QnA => &self.qna,
            ConversationType::Free => &self.free,
            ConversationType::Teach | ConversationType::Test => &self.general,
        }
    }
}

/// Opening prompts, one per conversation type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpeningSet {
    pub qna: PromptTemplate,
    pub test: PromptTemplate,
    pub free: PromptTemplate,
    pub teach: PromptTemplate,
}

impl OpeningSet {
    pub fn for_type(&self, conversation_type: ConversationType) -> &PromptTemplate {
        match conversation_type {
            ConversationType::QnA => &self.qna,
            ConversationType::Test => &self.test,
            ConversationType::Free => &self.free,
            ConversationType::Teach => &self.teach,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentCatalog {
    pub version: u32,
    pub agents: Vec<AgentDefinition>,
    pub classifiers: ClassifierSet,
    pub openings: OpeningSet,
    pub summary: PromptTemplate,
}

impl AgentCatalog {
    /// The compiled-in catalog
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml(BUILTIN_CATALOG)
    }

    /// Load from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::FileNotFound(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Load `path` when given, otherwise the compiled-in catalog
    pub fn load_or_builtin(path: Option<&str>) -> Result<Self, ConfigError> {
        let catalog = match path {
            Some(path) => Self::load(path)?,
            None => Self::builtin()?,
        };
        tracing::info!(
            version = catalog.version,
            agents = catalog.agents.len(),
            source = path.unwrap_or("builtin"),
            "Agent catalog loaded"
        );
        Ok(catalog)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let catalog: Self = serde_yaml::from_str(yaml)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 {
            return Err(ConfigError::InvalidValue {
                field: "catalog.version".to_string(),
                message: "Version must start at 1".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for agent in &self.agents {
            if !seen.insert(agent.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: format!("catalog.agents.{}", agent.name),
                    message: "Duplicate agent name".to_string(),
                });
            }
            if agent.prompt_template.trim().is_empty() {
                return Err(ConfigError::MissingField(format!(
                    "catalog.agents.{}.prompt_template",
                    agent.name
                )));
            }
        }

        if !seen.contains(FALLBACK_AGENT) {
            return Err(ConfigError::MissingField(format!(
                "catalog.agents.{}",
                FALLBACK_AGENT
            )));
        }

        if !self.summary.prompt_template.contains("{{transcript}}") {
            return Err(ConfigError::InvalidValue {
                field: "catalog.summary.prompt_template".to_string(),
                message: "Summary prompt must contain {{transcript}}".to_string(),
            });
        }

        Ok(())
    }

    pub fn agent(&self, name: &str) -> Option<&AgentDefinition> {
        self.agents.iter().find(|a| a.name == name)
    }

    pub fn agent_names(&self) -> impl Iterator<Item = &str> {
        self.agents.iter().map(|a| a.name.as_str())
    }
}

/// Substitution values for catalog placeholders
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub student_name: String,
    pub conversation_type: ConversationType,
    pub transcript: Option<String>,
}

impl Default for PromptContext {
    fn default() -> Self {
        Self {
            student_name: fallbacks::STUDENT_NAME.to_string(),
            conversation_type: ConversationType::default(),
            transcript: None,
        }
    }
}

impl PromptContext {
    pub fn new(student_name: &str, conversation_type: ConversationType) -> Self {
        Self {
            student_name: student_name.to_string(),
            conversation_type,
            transcript: None,
        }
    }

    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = Some(transcript.into());
        self
    }

    /// Substitute placeholders in a template string
    pub fn substitute(&self, template: &str) -> String {
        let mut result = template
            .replace("{{user.firstName}}", &self.student_name)
            .replace("{{conversationType}}", self.conversation_type.as_str());

        if let Some(ref transcript) = self.transcript {
            result = result.replace("{{transcript}}", transcript);
        }

        result
    }
}
