//! Traits for the collaborators the tutor core consumes
//!
//! - `LanguageModel` - chat completion
//! - `TextToSpeech` - speech synthesis
//! - `SpeechToText` - transcription of recorded clips
//! - `ConversationStore`, `MessageStore`, `UserDirectory` - persistence

mod llm;
mod speech;
mod store;

pub use llm::LanguageModel;
pub use speech::{SpeechToText, TextToSpeech};
pub use store::{ConversationStore, MessageStore, UserDirectory};
