//! Persistence of conversations between turns.
//!
//! A [`CheckpointStore`] owns the durable copy of every thread. The turn
//! controller never talks to a store directly but through a
//! [`Checkpointer`], which serializes all access to one thread so that two
//! turns of the same thread can never interleave their appends.

mod error;
mod file;
mod memory;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

pub use error::{Error, ErrorKind};
pub use file::FileStore;
pub use memory::MemoryStore;

use crate::conversation::ConversationState;

/// A storage backend for conversations.
///
/// Implementations must be safe to use from many tasks at once. They do
/// not need to serialize writers of the same thread themselves, that's
/// what [`Checkpointer`] is for.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Loads the conversation of a thread, or an empty one if the thread
    /// has never been saved.
    async fn load(&self, thread_id: &str) -> Result<ConversationState, Error>;

    /// Replaces the saved conversation of a thread.
    async fn save(
        &self,
        thread_id: &str,
        state: &ConversationState,
    ) -> Result<(), Error>;
}

/// Grants exclusive access to threads of a store.
#[derive(Clone)]
pub struct Checkpointer {
    store: Arc<dyn CheckpointStore>,
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl Checkpointer {
    /// Wraps a store.
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            store,
            locks: Default::default(),
        }
    }

    /// Waits until no one else holds the thread, then takes it.
    ///
    /// The thread stays locked until the returned lease is dropped.
    pub async fn acquire(&self, thread_id: &str) -> ThreadLease {
        let lock = {
            let mut locks =
                self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Forget locks nobody is holding or waiting for.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(thread_id.to_owned()).or_default())
        };
        if lock.try_lock().is_err() {
            debug!("thread {thread_id} is busy, waiting for its turn");
        }
        let guard = lock.lock_owned().await;
        ThreadLease {
            thread_id: thread_id.to_owned(),
            store: Arc::clone(&self.store),
            _guard: guard,
        }
    }
}

/// Exclusive access to one thread of a store.
pub struct ThreadLease {
    thread_id: String,
    store: Arc<dyn CheckpointStore>,
    _guard: OwnedMutexGuard<()>,
}

impl ThreadLease {
    /// Returns the id of the leased thread.
    #[inline]
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Loads the conversation of the leased thread.
    pub async fn load(&self) -> Result<ConversationState, Error> {
        let mut state = self.store.load(&self.thread_id).await?;
        state.thread_id.clone_from(&self.thread_id);
        Ok(state)
    }

    /// Saves the conversation of the leased thread.
    pub async fn save(&self, state: &ConversationState) -> Result<(), Error> {
        trace!(
            "checkpointing thread {} ({} messages)",
            self.thread_id,
            state.messages.len()
        );
        self.store.save(&self.thread_id, state).await
    }
}
