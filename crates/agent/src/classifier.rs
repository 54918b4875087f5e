//! Routes a student utterance to an agent
//!
//! The routing rules live in the classifier prompt (one per conversation
//! mode, from the agent catalog). The model answers with a JSON object
//! naming the agent; anything unusable routes to [`AgentKind::FALLBACK`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tutor_config::{ClassifierSet, PromptContext};
use tutor_core::{ConversationType, GenerateRequest, LanguageModel};

use crate::agent::complete;
use crate::registry::AgentKind;

#[derive(Debug, Clone, Copy)]
pub struct ClassificationContext<'a> {
    pub student_name: &'a str,
    pub conversation_type: ConversationType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub agent: AgentKind,
    /// 0.0 - 1.0
    pub confidence: f32,
    pub reasoning: String,
}

impl Classification {
    pub fn fallback(reasoning: impl Into<String>) -> Self {
        Self {
            agent: AgentKind::FALLBACK,
            confidence: 0.0,
            reasoning: reasoning.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    selected_agent: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Parse a classifier reply.
///
/// Accepts a JSON object (possibly wrapped in prose or a code fence) or a
/// bare agent name. Returns `None` when no known agent is named.
pub fn parse_classification(raw: &str) -> Option<Classification> {
    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if start < end {
            let parsed: RawClassification = serde_json::from_str(&raw[start..=end]).ok()?;
            let agent = parsed.selected_agent.parse::<AgentKind>().ok()?;
            return Some(Classification {
                agent,
                confidence: parsed.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
                reasoning: parsed.reasoning.unwrap_or_default(),
            });
        }
    }

    let bare = raw.trim().trim_matches(|c: char| c == '"' || c == '\'' || c == '.');
    bare.parse::<AgentKind>().ok().map(|agent| Classification {
        agent,
        confidence: 0.5,
        reasoning: String::new(),
    })
}

pub struct Classifier {
    llm: Arc<dyn LanguageModel>,
    prompts: ClassifierSet,
    default_model: String,
    timeout: Duration,
}

impl Classifier {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        prompts: ClassifierSet,
        default_model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            llm,
            prompts,
            default_model: default_model.into(),
            timeout,
        }
    }

    fn build_request(&self, text: &str, ctx: &ClassificationContext<'_>) -> GenerateRequest {
        let definition = self.prompts.for_type(ctx.conversation_type);
        let system = PromptContext::new(ctx.student_name, ctx.conversation_type)
            .substitute(&definition.prompt_template);

        GenerateRequest::new(system)
            .with_user_message(text)
            .with_model(
                definition
                    .model
                    .clone()
                    .unwrap_or_else(|| self.default_model.clone()),
            )
            .with_temperature(definition.temperature)
            .with_max_tokens(definition.max_tokens)
    }

    /// Never fails: errors and unusable replies route to the fallback agent
    pub async fn classify(&self, text: &str, ctx: &ClassificationContext<'_>) -> Classification {
        let request = self.build_request(text, ctx);

        let classification = match complete(self.llm.as_ref(), request, self.timeout).await {
            Ok(reply) => parse_classification(&reply).unwrap_or_else(|| {
                tracing::warn!(reply = %reply, "Unusable classifier reply, using fallback agent");
                Classification::fallback("unparsable classifier reply")
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Classification failed, using fallback agent");
                Classification::fallback(format!("classification failed: {}", e))
            }
        };

        tracing::debug!(
            agent = %classification.agent,
            confidence = classification.confidence,
            conversation_type = %ctx.conversation_type,
            "Message classified"
        );
        classification
    }
}
