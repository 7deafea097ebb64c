use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{CheckpointStore, Error};
use crate::conversation::{ConversationState, Message};

/// A store keeping conversations in memory for the lifetime of the
/// process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    threads: Mutex<HashMap<String, Vec<Message>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ids of all saved threads, sorted.
    pub fn thread_ids(&self) -> Vec<String> {
        let threads =
            self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<_> = threads.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn load(&self, thread_id: &str) -> Result<ConversationState, Error> {
        let threads =
            self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        let messages = threads.get(thread_id).cloned().unwrap_or_default();
        Ok(ConversationState {
            thread_id: thread_id.to_owned(),
            messages,
        })
    }

    async fn save(
        &self,
        thread_id: &str,
        state: &ConversationState,
    ) -> Result<(), Error> {
        let mut threads =
            self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        threads.insert(thread_id.to_owned(), state.messages.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_unknown_thread() {
        let store = MemoryStore::new();
        let state = store.load("nobody").await.unwrap();
        assert_eq!(state, ConversationState::new("nobody"));
        assert!(store.thread_ids().is_empty());
    }

    #[tokio::test]
    async fn test_save_is_idempotent() {
        let store = MemoryStore::new();
        let mut state = ConversationState::new("t1");
        state.messages.push(Message::user("hi"));
        store.save("t1", &state).await.unwrap();

        let loaded = store.load("t1").await.unwrap();
        store.save("t1", &loaded).await.unwrap();
        assert_eq!(store.load("t1").await.unwrap(), state);
        assert_eq!(store.thread_ids(), ["t1"]);
    }

    #[tokio::test]
    async fn test_threads_are_isolated() {
        let store = MemoryStore::new();
        let mut state = ConversationState::new("t1");
        state.messages.push(Message::user("hi"));
        store.save("t1", &state).await.unwrap();

        assert!(store.load("t2").await.unwrap().messages.is_empty());
    }
}
