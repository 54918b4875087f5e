//! Fixed fallbacks and defaults shared across crates

/// Endpoints and model names for the OpenAI-compatible upstream
pub mod endpoints {
    pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
    /// Model used by the classifier and the tutoring agents
    pub const AGENT_MODEL: &str = "gpt-3.5-turbo-0125";
    /// Model used for openings and summaries
    pub const UTILITY_MODEL: &str = "gpt-4o-mini";
    pub const TTS_MODEL: &str = "tts-1";
    pub const TTS_VOICE: &str = "nova";
    /// Transcription of uploaded recordings
    pub const STT_MODEL: &str = "whisper-1";
    /// Read when `llm.api_key` is not configured
    pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
}

/// Speech synthesis limits
pub mod speech {
    pub const CACHE_CAPACITY: usize = 100;
    pub const MAX_PHRASE_CHARS: usize = 50;
    /// Encoded data URLs at or above this length are never cached
    pub const MAX_CACHED_ENTRY_BYTES: usize = 1024 * 1024;
    /// Upstream transcription rejects larger files
    pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
}

/// Timeouts, in milliseconds
pub mod timeouts {
    pub const LLM_MS: u64 = 30_000;
    pub const TTS_MS: u64 = 20_000;
    pub const STT_MS: u64 = 60_000;
}

/// User-facing fallback text
pub mod fallbacks {
    pub const EMPTY_AGENT_REPLY: &str = "No response generated";
    pub const PROCESSING_ERROR: &str = "Sorry, I encountered an error processing your request.";
    pub const UNTITLED_CONVERSATION: &str = "Untitled Conversation";
    pub const NO_SUMMARY: &str = "No summary available.";
    pub const SESSION_TITLE: &str = "English Practice Session";
    pub const SESSION_SUMMARY: &str = "A conversation to practice English skills.";
    pub const STUDENT_NAME: &str = "friend";

    /// Opening used when the model answers with nothing
    pub fn opening(conversation_type: &str) -> String {
        format!("Welcome to your {} English session!", conversation_type)
    }

    /// Opening used when generation fails outright
    pub fn opening_after_error(conversation_type: &str) -> String {
        format!(
            "Welcome to your {} English session! I'm here to help you practice.",
            conversation_type
        )
    }
}

/// Summary transcript bounds
pub mod summary {
    pub const MAX_TRANSCRIPT_CHARS: usize = 4000;
}
