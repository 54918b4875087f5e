//! Application State
//!
//! Shared state across all handlers.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use tutor_agent::{OrchestratorConfig, OrchestratorDeps, TutorOrchestrator};
use tutor_config::{AgentCatalog, Settings};
use tutor_core::{
    ConversationStore, LanguageModel, MessageStore, SpeechToText, TextToSpeech, UserDirectory,
};

use crate::store::{InMemoryConversationStore, InMemoryMessageStore, InMemoryUserDirectory};
use crate::ServerError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub orchestrator: Arc<TutorOrchestrator>,
    pub conversations: Arc<dyn ConversationStore>,
    pub messages: Arc<dyn MessageStore>,
    pub users: Arc<dyn UserDirectory>,
    /// Transcription for uploaded recordings; not used by the turn loop
    pub stt: Arc<dyn SpeechToText>,
    /// Absent when metrics are disabled or the recorder was installed elsewhere
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// State backed by process-local stores
    pub fn in_memory(
        config: Settings,
        catalog: AgentCatalog,
        llm: Arc<dyn LanguageModel>,
        tts: Arc<dyn TextToSpeech>,
        stt: Arc<dyn SpeechToText>,
    ) -> Result<Self, ServerError> {
        let deps = OrchestratorDeps {
            llm,
            tts,
            conversations: Arc::new(InMemoryConversationStore::new()),
            messages: Arc::new(InMemoryMessageStore::new()),
            users: Arc::new(InMemoryUserDirectory::new()),
        };
        Self::with_deps(config, catalog, deps, stt)
    }

    /// State over caller-provided collaborators
    pub fn with_deps(
        config: Settings,
        catalog: AgentCatalog,
        deps: OrchestratorDeps,
        stt: Arc<dyn SpeechToText>,
    ) -> Result<Self, ServerError> {
        let orchestrator = TutorOrchestrator::new(
            deps.clone(),
            catalog,
            OrchestratorConfig::from_settings(&config),
        )?;

        Ok(Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            conversations: deps.conversations,
            messages: deps.messages,
            users: deps.users,
            stt,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn get_config(&self) -> &Settings {
        &self.config
    }
}
