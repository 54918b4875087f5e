//! Conversation, message and user records
//!
//! These are the shapes the external stores persist. The tutor core only
//! reads them and asks the stores to create or update them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Kind of tutoring session. Fixed for the lifetime of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ConversationType {
    QnA,
    Test,
    #[default]
    Free,
    Teach,
}

impl ConversationType {
    pub const ALL: [ConversationType; 4] = [
        ConversationType::QnA,
        ConversationType::Test,
        ConversationType::Free,
        ConversationType::Teach,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationType::QnA => "QnA",
            ConversationType::Test => "Test",
            ConversationType::Free => "Free",
            ConversationType::Teach => "Teach",
        }
    }
}

impl fmt::Display for ConversationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "qna" => Ok(ConversationType::QnA),
            "test" => Ok(ConversationType::Test),
            "free" => Ok(ConversationType::Free),
            "teach" => Ok(ConversationType::Teach),
            other => Err(Error::Validation(format!(
                "unknown conversation type: {}",
                other
            ))),
        }
    }
}

/// Conversation lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    #[default]
    Active,
    Completed,
}

/// A tutoring conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(rename = "type", default)]
    pub conversation_type: ConversationType,
    pub status: ConversationStatus,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// New active conversation. The theme defaults to the lower-cased type.
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        conversation_type: ConversationType,
        theme: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            title: title.into(),
            theme: theme.or_else(|| Some(conversation_type.as_str().to_lowercase())),
            conversation_type,
            status: ConversationStatus::Active,
            is_active: true,
            summary: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark completed with a summary; an empty or missing title keeps the old one.
    pub fn complete(&mut self, summary: impl Into<String>, title: Option<&str>) {
        self.status = ConversationStatus::Completed;
        self.is_active = false;
        self.summary = Some(summary.into());
        if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
            self.title = title.to_string();
        }
        self.updated_at = Utc::now();
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = Utc::now();
    }
}

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Student,
    Tutor,
}

impl Sender {
    /// Upper-case label used in transcripts
    pub fn label(&self) -> &'static str {
        match self {
            Sender::Student => "STUDENT",
            Sender::Tutor => "TUTOR",
        }
    }
}

/// Per-message like/dislike. At most one of the two flags is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Feedback {
    liked: bool,
    disliked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
}

impl Feedback {
    /// Build from explicit flags; both set is rejected.
    pub fn from_flags(liked: bool, disliked: bool) -> Result<Self> {
        if liked && disliked {
            return Err(Error::Validation(
                "message cannot be both liked and disliked".to_string(),
            ));
        }
        Ok(Self {
            liked,
            disliked,
            timestamp: Some(Utc::now()),
        })
    }

    /// Overwrite both flags at once; both set is rejected and leaves `self` untouched.
    pub fn set(&mut self, liked: bool, disliked: bool) -> Result<()> {
        *self = Self::from_flags(liked, disliked)?;
        Ok(())
    }

    pub fn liked(&self) -> bool {
        self.liked
    }

    pub fn disliked(&self) -> bool {
        self.disliked
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn like(&mut self) {
        self.set_liked(true);
    }

    pub fn dislike(&mut self) {
        self.set_disliked(true);
    }

    pub fn toggle_like(&mut self) {
        self.set_liked(!self.liked);
    }

    pub fn toggle_dislike(&mut self) {
        self.set_disliked(!self.disliked);
    }

    fn set_liked(&mut self, value: bool) {
        self.liked = value;
        if value {
            self.disliked = false;
        }
        self.timestamp = Some(Utc::now());
    }

    fn set_disliked(&mut self, value: bool) {
        self.disliked = value;
        if value {
            self.liked = false;
        }
        self.timestamp = Some(Utc::now());
    }
}

/// Diagnostics attached to tutor messages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_type: Option<ConversationType>,
}

/// A single chat message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: String,
    pub user_id: String,
    pub conversation_id: String,
    pub sender: Sender,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
    pub created_at: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn new(
        user_id: impl Into<String>,
        conversation_id: impl Into<String>,
        sender: Sender,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            conversation_id: conversation_id.into(),
            sender,
            text: text.into(),
            feedback: None,
            metadata: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// `SENDER: text` line for summaries
    pub fn transcript_line(&self) -> String {
        format!("{}: {}", self.sender.label(), self.text)
    }
}

/// A student account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    /// Identifier issued by the external auth provider
    pub auth_id: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        email: impl Into<String>,
        name: impl Into<String>,
        auth_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.into(),
            name: name.into(),
            auth_id: auth_id.into(),
            created_at: Utc::now(),
        }
    }

    /// First word of the display name, used to address the student
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or("friend")
    }
}
