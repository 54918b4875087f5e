//! Configuration for the English tutor backend
//!
//! Supports loading configuration from:
//! - `config/default` and `config/{env}` files (YAML or TOML)
//! - Environment variables (`TUTOR__` prefix, `__` separator)
//! - An optional agent catalog YAML overriding the compiled-in prompts

pub mod catalog;
pub mod constants;
pub mod settings;

pub use catalog::{
    AgentCatalog, AgentDefinition, ClassifierDefinition, ClassifierSet, OpeningSet,
    PromptContext, PromptTemplate,
};
pub use settings::{
    load_settings, AgentSettings, LlmSettings, ObservabilityConfig, RuntimeEnvironment,
    ServerConfig, Settings, SpeechSettings, SttSettings, TtsSettings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ConfigError> for tutor_core::Error {
    fn from(err: ConfigError) -> Self {
        tutor_core::Error::Validation(err.to_string())
    }
}
