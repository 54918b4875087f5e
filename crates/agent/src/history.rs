//! Per-conversation bounded turn history

use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;
use tutor_core::Message;

/// Recent user/assistant messages per conversation, oldest exchange dropped
/// first. The window always starts on a user turn.
pub struct ConversationHistory {
    max_messages: usize,
    conversations: RwLock<HashMap<String, VecDeque<Message>>>,
}

impl ConversationHistory {
    /// `max_messages` is rounded up to whole exchanges
    pub fn new(max_messages: usize) -> Self {
        let max_messages = max_messages.max(2);
        Self {
            max_messages: max_messages + max_messages % 2,
            conversations: RwLock::new(HashMap::new()),
        }
    }

    /// Messages for the conversation, oldest first
    pub fn snapshot(&self, conversation_id: &str) -> Vec<Message> {
        self.conversations
            .read()
            .get(conversation_id)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn record_exchange(&self, conversation_id: &str, student: &str, tutor: &str) {
        let mut conversations = self.conversations.write();
        let turns = conversations.entry(conversation_id.to_string()).or_default();
        turns.push_back(Message::user(student));
        turns.push_back(Message::assistant(tutor));
        while turns.len() > self.max_messages {
            turns.pop_front();
            turns.pop_front();
        }
    }

    /// Returns whether the conversation had any history
    pub fn reset(&self, conversation_id: &str) -> bool {
        self.conversations.write().remove(conversation_id).is_some()
    }

    pub fn len(&self, conversation_id: &str) -> usize {
        self.conversations
            .read()
            .get(conversation_id)
            .map_or(0, VecDeque::len)
    }

    pub fn active_conversations(&self) -> usize {
        self.conversations.read().len()
    }
}
