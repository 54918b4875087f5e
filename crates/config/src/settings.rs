//! Layered runtime settings
//!
//! Every section deserializes with defaults, so an empty or missing config
//! directory still yields a usable `Settings`.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{endpoints, speech, timeouts};
use crate::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    /// An API key is mandatory
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        *self == Self::Production
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub server: ServerConfig,

    /// Chat-completions upstream
    #[serde(default)]
    pub llm: LlmSettings,

    /// Speech upstream
    #[serde(default)]
    pub tts: TtsSettings,

    /// Transcription upstream
    #[serde(default)]
    pub stt: SttSettings,

    /// Phrase splitting and audio cache
    #[serde(default)]
    pub speech: SpeechSettings,

    /// Agent catalog and history
    #[serde(default)]
    pub agents: AgentSettings,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn out_of_range(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

impl Settings {
    /// Reject values the services cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_llm()?;
        self.validate_speech()?;
        self.validate_agents()
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(out_of_range("server.port", "must be non-zero"));
        }
        if self.server.timeout_seconds == 0 {
            return Err(out_of_range("server.timeout_seconds", "must be at least 1"));
        }
        Ok(())
    }

    fn validate_llm(&self) -> Result<(), ConfigError> {
        if self.llm.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingField("llm.endpoint".to_string()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(out_of_range(
                "llm.temperature",
                format!("{} is outside 0.0..=2.0", self.llm.temperature),
            ));
        }
        if self.llm.timeout_ms == 0 {
            return Err(out_of_range("llm.timeout_ms", "must be non-zero"));
        }
        if self.tts.timeout_ms == 0 {
            return Err(out_of_range("tts.timeout_ms", "must be non-zero"));
        }
        if self.stt.timeout_ms == 0 {
            return Err(out_of_range("stt.timeout_ms", "must be non-zero"));
        }
        if self.stt.max_upload_bytes == 0 {
            return Err(out_of_range("stt.max_upload_bytes", "must be non-zero"));
        }
        if self.environment.is_production() && self.llm.resolved_api_key().is_none() {
            return Err(ConfigError::MissingField(format!(
                "llm.api_key (or {})",
                endpoints::API_KEY_ENV
            )));
        }
        Ok(())
    }

    fn validate_speech(&self) -> Result<(), ConfigError> {
        if self.speech.cache_capacity == 0 {
            return Err(out_of_range("speech.cache_capacity", "cache must hold at least one phrase"));
        }
        if self.speech.max_phrase_chars < 10 {
            return Err(out_of_range("speech.max_phrase_chars", "must be at least 10"));
        }
        Ok(())
    }

    fn validate_agents(&self) -> Result<(), ConfigError> {
        if self.agents.history_max_messages == 0 {
            return Err(out_of_range("agents.history_max_messages", "must keep at least one message"));
        }
        Ok(())
    }
}

/// HTTP listener
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// CORS allowed origins; empty falls back to http://localhost:3000
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_seconds: default_timeout(),
            cors_enabled: true,
            cors_origins: Vec::new(),
        }
    }
}

/// Chat-completions upstream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Falls back to `OPENAI_API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model for classification and agents
    #[serde(default = "default_agent_model")]
    pub model: String,

    /// Model for openings and summaries
    #[serde(default = "default_utility_model")]
    pub utility_model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_llm_timeout")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_backoff")]
    pub initial_backoff_ms: u64,
}

fn default_endpoint() -> String {
    endpoints::OPENAI_BASE_URL.to_string()
}

fn default_agent_model() -> String {
    endpoints::AGENT_MODEL.to_string()
}

fn default_utility_model() -> String {
    endpoints::UTILITY_MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_llm_timeout() -> u64 {
    timeouts::LLM_MS
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff() -> u64 {
    100
}

impl LlmSettings {
    /// Configured key, else the `OPENAI_API_KEY` environment variable
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(endpoints::API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            model: default_agent_model(),
            utility_model: default_utility_model(),
            temperature: default_temperature(),
            timeout_ms: default_llm_timeout(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_backoff(),
        }
    }
}

/// Speech upstream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsSettings {
    /// Defaults to `llm.endpoint` when unset
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_tts_model")]
    pub model: String,

    #[serde(default = "default_voice")]
    pub voice: String,

    #[serde(default = "default_tts_timeout")]
    pub timeout_ms: u64,
}

fn default_tts_model() -> String {
    endpoints::TTS_MODEL.to_string()
}

fn default_voice() -> String {
    endpoints::TTS_VOICE.to_string()
}

fn default_tts_timeout() -> u64 {
    timeouts::TTS_MS
}

impl Default for TtsSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: default_tts_model(),
            voice: default_voice(),
            timeout_ms: default_tts_timeout(),
        }
    }
}

/// Transcription upstream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttSettings {
    /// Defaults to `llm.endpoint` when unset
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_stt_model")]
    pub model: String,

    #[serde(default = "default_stt_timeout")]
    pub timeout_ms: u64,

    /// Largest accepted upload; also the request body limit of the route
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_stt_model() -> String {
    endpoints::STT_MODEL.to_string()
}

fn default_stt_timeout() -> u64 {
    timeouts::STT_MS
}

fn default_max_upload_bytes() -> usize {
    speech::MAX_UPLOAD_BYTES
}

impl Default for SttSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: default_stt_model(),
            timeout_ms: default_stt_timeout(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// Phrase splitting and audio cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechSettings {
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    #[serde(default = "default_max_phrase_chars")]
    pub max_phrase_chars: usize,

    #[serde(default = "default_max_cached_entry_bytes")]
    pub max_cached_entry_bytes: usize,
}

fn default_cache_capacity() -> usize {
    speech::CACHE_CAPACITY
}

fn default_max_phrase_chars() -> usize {
    speech::MAX_PHRASE_CHARS
}

fn default_max_cached_entry_bytes() -> usize {
    speech::MAX_CACHED_ENTRY_BYTES
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            max_phrase_chars: default_max_phrase_chars(),
            max_cached_entry_bytes: default_max_cached_entry_bytes(),
        }
    }
}

/// Agent catalog and per-conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// YAML catalog replacing the compiled-in prompts
    #[serde(default)]
    pub catalog_path: Option<String>,

    /// Turns kept per conversation (user and assistant messages count separately)
    #[serde(default = "default_history")]
    pub history_max_messages: usize,
}

fn default_history() -> usize {
    20
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            catalog_path: None,
            history_max_messages: default_history(),
        }
    }
}

/// Logging and metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info,tutor=debug".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// `config/default` < `config/{env}` < `TUTOR__SECTION__KEY` variables
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("TUTOR")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    tracing::debug!(
        environment = ?settings.environment,
        model = %settings.llm.model,
        cache_capacity = settings.speech.cache_capacity,
        "Settings loaded"
    );

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.llm.model, "gpt-3.5-turbo-0125");
        assert_eq!(settings.llm.utility_model, "gpt-4o-mini");
        assert_eq!(settings.tts.voice, "nova");
        assert_eq!(settings.stt.model, "whisper-1");
        assert_eq!(settings.stt.max_upload_bytes, 25 * 1024 * 1024);
        assert_eq!(settings.speech.cache_capacity, 100);
        assert_eq!(settings.speech.max_phrase_chars, 50);
        assert_eq!(settings.speech.max_cached_entry_bytes, 1024 * 1024);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_cache_rejected() {
        let mut settings = Settings::default();
        settings.speech.cache_capacity = 0;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_temperature_range() {
        let mut settings = Settings::default();
        settings.llm.temperature = 2.5;
        assert!(settings.validate().is_err());

        settings.llm.temperature = 1.0;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_server_validation() {
        let mut settings = Settings::default();
        settings.server.port = 0;
        assert!(settings.validate().is_err());

        settings.server.port = 3000;
        settings.server.timeout_seconds = 0;
        assert!(settings.validate().is_err());

        settings.server.timeout_seconds = 60;
        settings.stt.timeout_ms = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_configured_key_wins() {
        let llm = LlmSettings {
            api_key: Some("sk-configured".to_string()),
            ..Default::default()
        };
        assert_eq!(llm.resolved_api_key().as_deref(), Some("sk-configured"));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
server:
  port: 9000
speech:
  cache_capacity: 5
"#;
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.speech.cache_capacity, 5);
        assert_eq!(settings.speech.max_phrase_chars, 50);
        assert_eq!(settings.tts.model, "tts-1");
    }
}
