//! Core traits and types for the English tutor backend
//!
//! This crate provides foundational types used across all other crates:
//! - Conversation, message and user records
//! - LLM request/response types
//! - Traits for the pluggable collaborators (LLM, TTS, STT, stores)
//! - Audio data-URL helpers
//! - Error types

pub mod audio;
pub mod conversation;
pub mod error;
pub mod llm_types;
pub mod traits;

pub use audio::{decode_data_url, encode_mp3_data_url, AudioClip, MP3_DATA_URL_PREFIX};
pub use conversation::{
    Conversation, ConversationMessage, ConversationStatus, ConversationType, Feedback,
    MessageMetadata, Sender, User,
};
pub use error::{Error, Result};
pub use llm_types::{FinishReason, GenerateRequest, GenerateResponse, Message, Role, TokenUsage};

pub use traits::{
    ConversationStore, LanguageModel, MessageStore, SpeechToText, TextToSpeech, UserDirectory,
};
