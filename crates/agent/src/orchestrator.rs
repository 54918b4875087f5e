//! Tutoring orchestrator
//!
//! Combines classification, agent invocation and speech synthesis into one
//! request/response cycle, and produces conversation openings and
//! end-of-conversation summaries with direct model calls.
//!
//! The public turn-level operations never fail: upstream errors are logged
//! with their cause and replaced by fixed fallback text. Only the store-backed
//! operations (`record_exchange`, `start_conversation`) return errors.

use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tutor_config::constants::{fallbacks, summary};
use tutor_config::{AgentCatalog, PromptContext, Settings};
use tutor_core::{
    Conversation, ConversationMessage, ConversationStore, ConversationType, GenerateRequest,
    LanguageModel, MessageMetadata, MessageStore, Sender, TextToSpeech, UserDirectory,
};

use crate::agent::{complete, AgentInput, TutorAgent};
use crate::cache::PhraseCache;
use crate::classifier::{ClassificationContext, Classifier};
use crate::history::ConversationHistory;
use crate::registry::{AgentKind, AgentRegistry};
use crate::speech::{SpeechConfig, SpeechSynthesizer};
use crate::AgentError;

static TITLE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?im)\bTITLE:[ \t]*(.*)$").unwrap());
static SUMMARY_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?im)\bSUMMARY:[ \t]*(.*)$").unwrap());

/// Reply to one student turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TutorResponse {
    pub text: String,
    /// `data:audio/mp3;base64,...`; absent when synthesis produced nothing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
}

impl TutorResponse {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            audio_url: None,
            metadata: None,
        }
    }

    fn with_audio(mut self, audio: String) -> Self {
        self.audio_url = (!audio.is_empty()).then_some(audio);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseMetadata {
    pub agent: AgentKind,
    pub confidence: f32,
    pub conversation_type: ConversationType,
    pub processing_time_ms: u64,
}

impl From<&ResponseMetadata> for MessageMetadata {
    fn from(meta: &ResponseMetadata) -> Self {
        MessageMetadata {
            agent: Some(meta.agent.to_string()),
            processing_time_ms: Some(meta.processing_time_ms),
            conversation_type: Some(meta.conversation_type),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSummary {
    pub title: String,
    pub summary: String,
}

impl ConversationSummary {
    fn fallback() -> Self {
        Self {
            title: fallbacks::SESSION_TITLE.to_string(),
            summary: fallbacks::SESSION_SUMMARY.to_string(),
        }
    }

    /// Pull `TITLE:` / `SUMMARY:` lines out of a model reply
    pub fn parse(reply: &str, existing_title: Option<&str>) -> Self {
        let line = |re: &Regex| {
            re.captures(reply)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let title = line(&TITLE_LINE).unwrap_or_else(|| {
            existing_title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or(fallbacks::UNTITLED_CONVERSATION)
                .to_string()
        });
        let summary = line(&SUMMARY_LINE).unwrap_or_else(|| fallbacks::NO_SUMMARY.to_string());

        Self { title, summary }
    }
}

/// Student and tutor messages persisted for one turn
#[derive(Debug, Clone, Serialize)]
pub struct RecordedExchange {
    pub response: TutorResponse,
    pub student_message: ConversationMessage,
    pub tutor_message: ConversationMessage,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartedConversation {
    pub conversation: Conversation,
    pub opening: TutorResponse,
    /// The persisted opening message, if storing it succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opening_message: Option<ConversationMessage>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Classifier and agents
    pub agent_model: String,
    /// Openings and summaries
    pub utility_model: String,
    pub llm_timeout: Duration,
    pub cache_capacity: usize,
    pub history_max_messages: usize,
    pub speech: SpeechConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        let settings = Settings::default();
        Self::from_settings(&settings)
    }
}

impl OrchestratorConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            agent_model: settings.llm.model.clone(),
            utility_model: settings.llm.utility_model.clone(),
            llm_timeout: Duration::from_millis(settings.llm.timeout_ms),
            cache_capacity: settings.speech.cache_capacity,
            history_max_messages: settings.agents.history_max_messages,
            speech: SpeechConfig::from_settings(
                &settings.speech,
                Duration::from_millis(settings.tts.timeout_ms),
            ),
        }
    }
}

/// External collaborators
#[derive(Clone)]
pub struct OrchestratorDeps {
    pub llm: Arc<dyn LanguageModel>,
    pub tts: Arc<dyn TextToSpeech>,
    pub conversations: Arc<dyn ConversationStore>,
    pub messages: Arc<dyn MessageStore>,
    pub users: Arc<dyn UserDirectory>,
}

pub struct TutorOrchestrator {
    llm: Arc<dyn LanguageModel>,
    conversations: Arc<dyn ConversationStore>,
    messages: Arc<dyn MessageStore>,
    users: Arc<dyn UserDirectory>,
    catalog: AgentCatalog,
    classifier: Classifier,
    registry: AgentRegistry,
    synthesizer: SpeechSynthesizer,
    history: ConversationHistory,
    config: OrchestratorConfig,
}

impl TutorOrchestrator {
    /// The phrase cache is created here and lives as long as the orchestrator
    pub fn new(
        deps: OrchestratorDeps,
        catalog: AgentCatalog,
        config: OrchestratorConfig,
    ) -> Result<Self, AgentError> {
        let registry = AgentRegistry::from_catalog(
            &catalog,
            deps.llm.clone(),
            &config.agent_model,
            config.llm_timeout,
        )?;
        let classifier = Classifier::new(
            deps.llm.clone(),
            catalog.classifiers.clone(),
            config.agent_model.clone(),
            config.llm_timeout,
        );
        let synthesizer = SpeechSynthesizer::new(
            deps.tts,
            Arc::new(PhraseCache::new(config.cache_capacity)),
            config.speech.clone(),
        );

        tracing::info!(
            catalog_version = catalog.version,
            agents = registry.len(),
            cache_capacity = config.cache_capacity,
            "Tutor orchestrator ready"
        );

        Ok(Self {
            llm: deps.llm,
            conversations: deps.conversations,
            messages: deps.messages,
            users: deps.users,
            catalog,
            classifier,
            registry,
            synthesizer,
            history: ConversationHistory::new(config.history_max_messages),
            config,
        })
    }

    /// Swap in a custom agent for one route
    pub fn with_agent(mut self, agent: Arc<dyn TutorAgent>) -> Self {
        self.registry = self.registry.with_agent(agent);
        self
    }

    pub fn synthesizer(&self) -> &SpeechSynthesizer {
        &self.synthesizer
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn catalog_version(&self) -> u32 {
        self.catalog.version
    }

    /// Answer one student utterance. Never fails.
    pub async fn process_input(
        &self,
        text: &str,
        user_id: &str,
        conversation_id: &str,
    ) -> TutorResponse {
        match self.try_process_input(text, user_id, conversation_id).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    kind = e.kind(),
                    conversation_id,
                    "Failed to process input"
                );
                TutorResponse::text_only(fallbacks::PROCESSING_ERROR)
            }
        }
    }

    async fn try_process_input(
        &self,
        text: &str,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<TutorResponse, AgentError> {
        let start = Instant::now();

        let conversation = self
            .conversations
            .get_by_id(conversation_id)
            .await?
            .ok_or_else(|| AgentError::ConversationNotFound(conversation_id.to_string()))?;
        let conversation_type = conversation.conversation_type;
        let student_name = self.student_name(user_id).await;

        let classification = self
            .classifier
            .classify(
                text,
                &ClassificationContext {
                    student_name: &student_name,
                    conversation_type,
                },
            )
            .await;

        let agent = self.registry.resolve(classification.agent)?;
        let history = self.history.snapshot(conversation_id);
        let output = agent
            .respond(&AgentInput {
                text,
                student_name: &student_name,
                conversation_type,
                history: &history,
            })
            .await?;
        let reply = output.into_text();
        let routed_ms = start.elapsed().as_millis() as u64;

        self.history.record_exchange(conversation_id, text, &reply);

        let audio = self.synthesizer.synthesize(&reply).await;
        let processing_time_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            conversation_id,
            agent = %classification.agent,
            routed_ms,
            processing_time_ms,
            has_audio = !audio.is_empty(),
            "Processed student input"
        );

        Ok(TutorResponse {
            text: reply,
            audio_url: None,
            metadata: Some(ResponseMetadata {
                agent: classification.agent,
                confidence: classification.confidence,
                conversation_type,
                processing_time_ms,
            }),
        }
        .with_audio(audio))
    }

    /// Greeting for a new conversation. Never fails.
    pub async fn generate_conversation_opening(
        &self,
        user_id: &str,
        conversation_type: ConversationType,
    ) -> TutorResponse {
        let student_name = self.student_name(user_id).await;
        let template = self.catalog.openings.for_type(conversation_type);
        let prompt = PromptContext::new(&student_name, conversation_type)
            .substitute(&template.prompt_template);

        let mut request = GenerateRequest::new(prompt).with_model(
            template
                .model
                .clone()
                .unwrap_or_else(|| self.config.utility_model.clone()),
        );
        if let Some(temperature) = template.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = template.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        match complete(self.llm.as_ref(), request, self.config.llm_timeout).await {
            Ok(reply) => {
                let text = match reply.trim() {
                    "" => fallbacks::opening(conversation_type.as_str()),
                    trimmed => trimmed.to_string(),
                };
                let audio = self.synthesizer.synthesize(&text).await;
                TutorResponse::text_only(text).with_audio(audio)
            }
            Err(e) => {
                tracing::error!(error = %e, %conversation_type, "Failed to generate conversation opening");
                TutorResponse::text_only(fallbacks::opening_after_error(conversation_type.as_str()))
            }
        }
    }

    /// Title and summary for a conversation. Never fails.
    pub async fn generate_conversation_summary(&self, conversation_id: &str) -> ConversationSummary {
        match self.try_generate_summary(conversation_id).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(error = %e, conversation_id, "Failed to generate conversation summary");
                ConversationSummary::fallback()
            }
        }
    }

    async fn try_generate_summary(&self, conversation_id: &str) -> Result<ConversationSummary, AgentError> {
        let conversation = self
            .conversations
            .get_by_id(conversation_id)
            .await?
            .ok_or_else(|| AgentError::ConversationNotFound(conversation_id.to_string()))?;
        let messages = self.messages.list_by_conversation(conversation_id).await?;

        let transcript: String = messages
            .iter()
            .map(ConversationMessage::transcript_line)
            .collect::<Vec<_>>()
            .join("\n")
            .chars()
            .take(summary::MAX_TRANSCRIPT_CHARS)
            .collect();

        let template = &self.catalog.summary;
        let prompt = PromptContext::new(fallbacks::STUDENT_NAME, conversation.conversation_type)
            .with_transcript(transcript)
            .substitute(&template.prompt_template);

        let mut request = GenerateRequest::new(prompt).with_model(
            template
                .model
                .clone()
                .unwrap_or_else(|| self.config.utility_model.clone()),
        );
        if let Some(temperature) = template.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = template.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let reply = complete(self.llm.as_ref(), request, self.config.llm_timeout).await?;
        Ok(ConversationSummary::parse(&reply, Some(&conversation.title)))
    }

    /// Summarize, mark completed and drop the conversation's agent history.
    /// Errors are logged, never returned.
    pub async fn end_conversation(&self, conversation_id: &str) {
        let summary = self.generate_conversation_summary(conversation_id).await;

        match self
            .conversations
            .mark_completed(conversation_id, &summary.summary, Some(&summary.title))
            .await
        {
            Ok(Some(_)) => {
                tracing::info!(conversation_id, title = %summary.title, "Conversation completed");
            }
            Ok(None) => {
                tracing::warn!(conversation_id, "Cannot complete unknown conversation");
            }
            Err(e) => {
                tracing::error!(error = %e, conversation_id, "Failed to complete conversation");
            }
        }

        self.reset_conversation(conversation_id);
    }

    /// Persist the student message, answer it and persist the reply
    pub async fn record_exchange(
        &self,
        text: &str,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<RecordedExchange, AgentError> {
        let student_message = self
            .messages
            .create(user_id, conversation_id, Sender::Student, text, None)
            .await?;

        let response = self.process_input(text, user_id, conversation_id).await;

        let tutor_message = self
            .messages
            .create(
                user_id,
                conversation_id,
                Sender::Tutor,
                &response.text,
                response.metadata.as_ref().map(MessageMetadata::from),
            )
            .await?;

        Ok(RecordedExchange {
            response,
            student_message,
            tutor_message,
        })
    }

    /// End the user's active conversation (if any), then open a new one with a greeting
    pub async fn start_conversation(
        &self,
        user_id: &str,
        title: &str,
        conversation_type: ConversationType,
        theme: Option<&str>,
    ) -> Result<StartedConversation, AgentError> {
        if let Some(active) = self.conversations.get_active_for_user(user_id).await? {
            tracing::debug!(previous = %active.id, "Ending previous active conversation");
            self.end_conversation(&active.id).await;
        }

        let conversation = self
            .conversations
            .create_active(user_id, title, conversation_type, theme)
            .await?;

        let opening = self
            .generate_conversation_opening(user_id, conversation_type)
            .await;

        let metadata = MessageMetadata {
            conversation_type: Some(conversation_type),
            ..Default::default()
        };
        let opening_message = match self
            .messages
            .create(user_id, &conversation.id, Sender::Tutor, &opening.text, Some(metadata))
            .await
        {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::warn!(error = %e, conversation_id = %conversation.id, "Failed to store opening message");
                None
            }
        };

        Ok(StartedConversation {
            conversation,
            opening,
            opening_message,
        })
    }

    /// Forget the agent history of one conversation
    pub fn reset_conversation(&self, conversation_id: &str) {
        if self.history.reset(conversation_id) {
            tracing::debug!(conversation_id, "Conversation history reset");
        }
    }

    pub fn clear_audio_cache(&self) {
        self.synthesizer.clear_cache();
    }

    async fn student_name(&self, user_id: &str) -> String {
        match self.users.get_by_id(user_id).await {
            Ok(Some(user)) => user.first_name().to_string(),
            Ok(None) => fallbacks::STUDENT_NAME.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, user_id, "User lookup failed, using generic name");
                fallbacks::STUDENT_NAME.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_parse() {
        let reply = "TITLE: Animals at the zoo\nSUMMARY: We named zoo animals.\nExtra";
        let parsed = ConversationSummary::parse(reply, Some("Old"));
        assert_eq!(parsed.title, "Animals at the zoo");
        assert_eq!(parsed.summary, "We named zoo animals.");
    }

    #[test]
    fn test_summary_parse_case_insensitive_and_numbered() {
        let reply = "1. title: Colors\n2. Summary: Practised colour words";
        let parsed = ConversationSummary::parse(reply, None);
        assert_eq!(parsed.title, "Colors");
        assert_eq!(parsed.summary, "Practised colour words");
    }

    #[test]
    fn test_summary_parse_fallbacks() {
        let parsed = ConversationSummary::parse("TITLE: Weekend plans", None);
        assert_eq!(parsed.title, "Weekend plans");
        assert_eq!(parsed.summary, "No summary available.");

        let parsed = ConversationSummary::parse("nothing useful", Some("My chat"));
        assert_eq!(parsed.title, "My chat");

        let parsed = ConversationSummary::parse("nothing useful", Some("  "));
        assert_eq!(parsed.title, "Untitled Conversation");

        let parsed = ConversationSummary::parse("TITLE:\nSUMMARY: Short chat", Some("Kept"));
        assert_eq!(parsed.title, "Kept");
        assert_eq!(parsed.summary, "Short chat");
    }

    #[test]
    fn test_response_serialization_omits_empty_fields() {
        let json = serde_json::to_value(TutorResponse::text_only("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"text": "hi"}));

        let with_audio = TutorResponse::text_only("hi").with_audio(String::new());
        assert!(with_audio.audio_url.is_none());
    }

    #[test]
    fn test_config_from_settings() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.agent_model, "gpt-3.5-turbo-0125");
        assert_eq!(config.utility_model, "gpt-4o-mini");
        assert_eq!(config.cache_capacity, 100);
        assert_eq!(config.llm_timeout, Duration::from_secs(30));
        assert_eq!(config.speech.tts_timeout, Duration::from_secs(20));
    }
}
