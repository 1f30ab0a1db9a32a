use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{domain::ChatId, ports::StateStore, Result};

/// What the controller expects from a conversant next.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingCommand,
    AwaitingSearchTerm,
    AwaitingContactPair,
    AwaitingPassword,
}

/// Process-local state store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    inner: Mutex<HashMap<ChatId, ConversationState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of conversants currently outside `Idle`.
    #[cfg(test)]
    pub async fn active_len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, chat: ChatId) -> Result<ConversationState> {
        Ok(self
            .inner
            .lock()
            .await
            .get(&chat)
            .copied()
            .unwrap_or_default())
    }

    async fn set(&self, chat: ChatId, state: ConversationState) -> Result<()> {
        let mut map = self.inner.lock().await;
        // Idle is the absence of an entry.
        if state == ConversationState::Idle {
            map.remove(&chat);
        } else {
            map.insert(chat, state);
        }
        Ok(())
    }

    async fn clear(&self, chat: ChatId) -> Result<()> {
        self.inner.lock().await.remove(&chat);
        Ok(())
    }
}
