//! Conversation history management.
//!
//! Each user gets a bounded FIFO of turns. The whole map sits behind one
//! async mutex, which is plenty for the request rates a chat front end sees.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use gptbot_core::{ChatMessage, HistoryStore, Role};
use tokio::sync::Mutex;
use tracing::debug;

/// Turns kept per user unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 20;

/// Process-lifetime history store keyed by user id.
#[derive(Debug)]
pub struct InMemoryHistory {
    capacity: usize,
    turns: Mutex<HashMap<String, VecDeque<ChatMessage>>>,
}

impl InMemoryHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            turns: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of turns currently held for `user_id`.
    pub async fn len(&self, user_id: &str) -> usize {
        self.turns.lock().await.get(user_id).map_or(0, VecDeque::len)
    }

    /// Number of users with at least one recorded turn.
    pub async fn users(&self) -> usize {
        self.turns.lock().await.len()
    }
}

impl Default for InMemoryHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    async fn record(&self, user_id: &str, turn: ChatMessage) {
        let mut turns = self.turns.lock().await;
        let queue = turns
            .entry(user_id.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));
        queue.push_back(turn);
        while queue.len() > self.capacity {
            queue.pop_front();
        }
        debug!("History for {user_id}: {} turns", queue.len());
    }

    async fn read(&self, user_id: &str) -> Vec<ChatMessage> {
        self.turns
            .lock()
            .await
            .get(user_id)
            .map(|queue| queue.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Statistics about conversation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryStats {
    pub total_messages: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
    pub total_characters: usize,
    pub estimated_tokens: usize,
}

impl HistoryStats {
    #[must_use]
    pub fn of(history: &[ChatMessage]) -> Self {
        let total_chars: usize = history.iter().map(|m| m.content.chars().count()).sum();
        let user_count = history.iter().filter(|m| m.role == Role::User).count();
        let assistant_count = history.iter().filter(|m| m.role == Role::Assistant).count();

        Self {
            total_messages: history.len(),
            user_messages: user_count,
            assistant_messages: assistant_count,
            total_characters: total_chars,
            estimated_tokens: total_chars / 4, // Rough estimate: 4 chars per token
        }
    }
}
