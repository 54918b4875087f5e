//! Persistence traits
//!
//! The tutor core never owns storage. Servers plug in an implementation
//! (in-memory, document store, ...) behind these traits.

use async_trait::async_trait;

use crate::{
    Conversation, ConversationMessage, ConversationType, Feedback, MessageMetadata, Result,
    Sender, User,
};

/// Conversation persistence
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get_by_id(&self, id: &str) -> Result<Option<Conversation>>;

    /// Create a new active conversation, deactivating any other active
    /// conversation of the same user.
    async fn create_active(
        &self,
        user_id: &str,
        title: &str,
        conversation_type: ConversationType,
        theme: Option<&str>,
    ) -> Result<Conversation>;

    async fn get_active_for_user(&self, user_id: &str) -> Result<Option<Conversation>>;

    /// Most recently updated first
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversation>>;

    async fn mark_completed(
        &self,
        id: &str,
        summary: &str,
        title: Option<&str>,
    ) -> Result<Option<Conversation>>;

    async fn delete(&self, id: &str) -> Result<()>;
}

/// Message persistence
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create(
        &self,
        user_id: &str,
        conversation_id: &str,
        sender: Sender,
        text: &str,
        metadata: Option<MessageMetadata>,
    ) -> Result<ConversationMessage>;

    /// Oldest first
    async fn list_by_conversation(&self, conversation_id: &str) -> Result<Vec<ConversationMessage>>;

    /// Every message of the user across conversations, oldest first
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ConversationMessage>>;

    async fn update_feedback(
        &self,
        message_id: &str,
        feedback: Feedback,
    ) -> Result<Option<ConversationMessage>>;

    async fn delete(&self, message_id: &str) -> Result<()>;

    /// Remove every message of a conversation, returning how many were removed
    async fn delete_for_conversation(&self, conversation_id: &str) -> Result<usize>;
}

/// User lookup
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_by_id(&self, id: &str) -> Result<Option<User>>;

    /// Create or update the user keyed by the auth provider's id
    async fn upsert(&self, email: &str, name: &str, auth_id: &str) -> Result<User>;

    /// Change the display name; `None` when the user does not exist
    async fn rename(&self, id: &str, name: &str) -> Result<Option<User>>;
}
