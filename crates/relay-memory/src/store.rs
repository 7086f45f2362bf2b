//! Sliding-window conversation store.
//!
//! Each conversation key owns a FIFO of at most `max_turns` turns. A short
//! map lock resolves the key to its own async mutex, so different senders
//! never wait on each other while the same sender's requests line up.

#[cfg(test)]
mod tests;

use relay_core::{config::MemoryConfig, message::Turn};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

type Window = VecDeque<Turn>;
type Slot = Arc<AsyncMutex<Window>>;

/// Process-wide conversation history, keyed by conversation key.
#[derive(Clone)]
pub struct ConversationStore {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
    max_turns: usize,
}

impl ConversationStore {
    /// Create an empty store. A zero window is bumped to one.
    pub fn new(max_turns: usize) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            max_turns: max_turns.max(1),
        }
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        Self::new(config.max_turns)
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Number of keys that have been referenced so far.
    pub fn conversation_count(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn slot(&self, key: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            slots
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(VecDeque::with_capacity(self.max_turns)))),
        )
    }

    /// Lock a conversation for a read-modify-append sequence.
    ///
    /// Other callers for the same key wait until the session is dropped.
    pub async fn session(&self, key: &str) -> ConversationSession {
        let guard = self.slot(key).lock_owned().await;
        ConversationSession {
            key: key.to_string(),
            window: guard,
            max_turns: self.max_turns,
        }
    }

    /// Snapshot of a conversation, oldest first. Empty for unseen keys.
    pub async fn get(&self, key: &str) -> Vec<Turn> {
        self.session(key).await.turns()
    }

    /// Append a turn, evicting the oldest ones past capacity.
    pub async fn append(&self, key: &str, turn: Turn) {
        self.session(key).await.append(turn);
    }

    /// Reset a conversation to empty.
    pub async fn clear(&self, key: &str) {
        self.session(key).await.clear();
    }
}

/// Exclusive handle on one conversation window.
pub struct ConversationSession {
    key: String,
    window: OwnedMutexGuard<Window>,
    max_turns: usize,
}

impl ConversationSession {
    pub fn turns(&self) -> Vec<Turn> {
        self.window.iter().cloned().collect()
    }

    pub fn append(&mut self, turn: Turn) {
        self.window.push_back(turn);
        while self.window.len() > self.max_turns {
            self.window.pop_front();
        }
    }

    pub fn clear(&mut self) {
        let dropped = self.window.len();
        self.window.clear();
        debug!("memory: cleared {dropped} turns for {}", self.key);
    }
}
