//! Agent reply shapes, normalized to plain text at the orchestration boundary

use serde::{Deserialize, Serialize};
use tutor_config::constants::fallbacks;

/// What an agent produced: bare text, `{"output": ..}` or `{"content": [..]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgentOutput {
    Text(String),
    Output { output: String },
    Content { content: Vec<String> },
}

impl AgentOutput {
    /// Interpret a raw model reply. JSON objects in one of the structured
    /// shapes are unwrapped; anything else is text.
    pub fn from_reply(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with('{') {
            if let Ok(output @ (AgentOutput::Output { .. } | AgentOutput::Content { .. })) =
                serde_json::from_str::<AgentOutput>(trimmed)
            {
                return output;
            }
        }
        AgentOutput::Text(raw.to_string())
    }

    /// Trimmed reply text, or the fixed fallback when empty
    pub fn into_text(self) -> String {
        let text = match self {
            AgentOutput::Text(text) => text,
            AgentOutput::Output { output } => output,
            AgentOutput::Content { content } => content.into_iter().next().unwrap_or_default(),
        };

        let trimmed = text.trim();
        if trimmed.is_empty() {
            fallbacks::EMPTY_AGENT_REPLY.to_string()
        } else {
            trimmed.to_string()
        }
    }
}
