//! In-memory stores
//!
//! Process-local implementations of the store traits, used by the server
//! binary and by tests. Nothing survives a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use tutor_core::{
    Conversation, ConversationMessage, ConversationStore, ConversationType, Feedback,
    MessageMetadata, MessageStore, Result, Sender, User, UserDirectory,
};

/// Conversations keyed by id. At most one active conversation per user.
#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.conversations.read().len()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get_by_id(&self, id: &str) -> Result<Option<Conversation>> {
        Ok(self.conversations.read().get(id).cloned())
    }

    async fn create_active(
        &self,
        user_id: &str,
        title: &str,
        conversation_type: ConversationType,
        theme: Option<&str>,
    ) -> Result<Conversation> {
        let conversation =
            Conversation::new(user_id, title, conversation_type, theme.map(str::to_string));

        // Deactivate and insert under one lock
        let mut conversations = self.conversations.write();
        for existing in conversations
            .values_mut()
            .filter(|c| c.user_id == user_id && c.is_active)
        {
            existing.deactivate();
        }
        conversations.insert(conversation.id.clone(), conversation.clone());

        Ok(conversation)
    }

    async fn get_active_for_user(&self, user_id: &str) -> Result<Option<Conversation>> {
        Ok(self
            .conversations
            .read()
            .values()
            .find(|c| c.user_id == user_id && c.is_active)
            .cloned())
    }

    /// Most recently updated first
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversation>> {
        let mut list: Vec<Conversation> = self
            .conversations
            .read()
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(list)
    }

    async fn mark_completed(
        &self,
        id: &str,
        summary: &str,
        title: Option<&str>,
    ) -> Result<Option<Conversation>> {
        Ok(self.conversations.write().get_mut(id).map(|c| {
            c.complete(summary, title);
            c.clone()
        }))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.conversations.write().remove(id);
        Ok(())
    }
}

/// Messages in insertion order
#[derive(Default)]
pub struct InMemoryMessageStore {
    messages: RwLock<Vec<ConversationMessage>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn create(
        &self,
        user_id: &str,
        conversation_id: &str,
        sender: Sender,
        text: &str,
        metadata: Option<MessageMetadata>,
    ) -> Result<ConversationMessage> {
        let mut message = ConversationMessage::new(user_id, conversation_id, sender, text);
        message.metadata = metadata;
        self.messages.write().push(message.clone());
        Ok(message)
    }

    async fn list_by_conversation(&self, conversation_id: &str) -> Result<Vec<ConversationMessage>> {
        Ok(self
            .messages
            .read()
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ConversationMessage>> {
        Ok(self
            .messages
            .read()
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_feedback(
        &self,
        message_id: &str,
        feedback: Feedback,
    ) -> Result<Option<ConversationMessage>> {
        Ok(self
            .messages
            .write()
            .iter_mut()
            .find(|m| m.id == message_id)
            .map(|m| {
                m.feedback = Some(feedback);
                m.clone()
            }))
    }

    async fn delete(&self, message_id: &str) -> Result<()> {
        self.messages.write().retain(|m| m.id != message_id);
        Ok(())
    }

    async fn delete_for_conversation(&self, conversation_id: &str) -> Result<usize> {
        let mut messages = self.messages.write();
        let before = messages.len();
        messages.retain(|m| m.conversation_id != conversation_id);
        Ok(before - messages.len())
    }
}

/// Users keyed by id; `upsert` matches on the external auth id
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.users.read().get(id).cloned())
    }

    async fn upsert(&self, email: &str, name: &str, auth_id: &str) -> Result<User> {
        let mut users = self.users.write();
        if let Some(existing) = users.values_mut().find(|u| u.auth_id == auth_id) {
            existing.email = email.to_string();
            existing.name = name.to_string();
            return Ok(existing.clone());
        }

        let user = User::new(email, name, auth_id);
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn rename(&self, id: &str, name: &str) -> Result<Option<User>> {
        Ok(self.users.write().get_mut(id).map(|user| {
            user.name = name.to_string();
            user.clone()
        }))
    }
}
