//! Conversation Store
//!
//! In-memory, process-lifetime storage. Created at process start, cleared
//! only at process end; there is deliberately no persistence or eviction.
//! The outer map supports independent access across conversation ids, while
//! each conversation carries its own async lock so turns at the same key
//! serialize (a second user message never starts before the previous turn
//! finalizes).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::message::{Conversation, Message};

/// Handle to one stored conversation
pub type ConversationHandle = Arc<Mutex<Conversation>>;

/// In-memory conversation store
pub struct ConversationStore {
    conversations: RwLock<HashMap<Uuid, ConversationHandle>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new conversation and return its id
    pub fn create(&self) -> Uuid {
        let conversation = Conversation::new();
        let id = conversation.id;
        self.conversations
            .write()
            .unwrap()
            .insert(id, Arc::new(Mutex::new(conversation)));
        id
    }

    /// Look up a conversation by id
    pub fn get(&self, id: Uuid) -> Option<ConversationHandle> {
        self.conversations.read().unwrap().get(&id).cloned()
    }

    /// Look up a conversation, creating it on first use of the id
    pub fn get_or_create(&self, id: Uuid) -> ConversationHandle {
        if let Some(handle) = self.get(id) {
            return handle;
        }
        self.conversations
            .write()
            .unwrap()
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(Conversation::with_id(id))))
            .clone()
    }

    /// Read-only history accessor: the ordered message list, or None
    pub async fn messages(&self, id: Uuid) -> Option<Vec<Message>> {
        let handle = self.get(id)?;
        let conversation = handle.lock().await;
        Some(conversation.messages().to_vec())
    }

    /// Number of stored conversations
    pub fn len(&self) -> usize {
        self.conversations.read().unwrap().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.conversations.read().unwrap().is_empty()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[tokio::test]
    async fn test_create_and_lookup() {
        let store = ConversationStore::new();
        let id = store.create();

        let handle = store.get(id).expect("conversation exists");
        assert!(handle.lock().await.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_id_not_found() {
        let store = ConversationStore::new();
        assert!(store.get(Uuid::new_v4()).is_none());
        assert!(store.messages(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_get_or_create_is_stable() {
        let store = ConversationStore::new();
        let id = Uuid::new_v4();

        let first = store.get_or_create(id);
        first.lock().await.push(Message::user("hello"));

        // Second lookup at the same key sees the same conversation
        let second = store.get_or_create(id);
        assert_eq!(second.lock().await.len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_messages_accessor_returns_order() {
        let store = ConversationStore::new();
        let id = store.create();

        {
            let handle = store.get(id).unwrap();
            let mut conversation = handle.lock().await;
            conversation.push(Message::user("first"));
            conversation.push(Message::assistant("second"));
        }

        let messages = store.messages(id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text(), "first");
        assert_eq!(messages[1].text(), "second");
    }

    #[tokio::test]
    async fn test_independent_keys() {
        let store = ConversationStore::new();
        let a = store.create();
        let b = store.create();
        assert_ne!(a, b);

        store.get(a).unwrap().lock().await.push(Message::user("to a"));
        assert!(store.messages(b).await.unwrap().is_empty());
        assert_eq!(store.messages(a).await.unwrap().len(), 1);
    }
}
