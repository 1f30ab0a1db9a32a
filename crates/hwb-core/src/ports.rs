use async_trait::async_trait;

use crate::{
    domain::{ChatId, Contact},
    errors::{ExecError, StoreError},
    state::ConversationState,
    Result,
};

/// Runs one shell command on the monitored host.
///
/// Implementations open a fresh session per call and close it before returning.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(&self, command: &str) -> std::result::Result<String, ExecError>;
}

/// Persistent contact records with unique email and phone.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Create the contacts relation if missing. Safe to call repeatedly.
    async fn ensure_schema(&self) -> std::result::Result<(), StoreError>;

    /// Contact whose email or phone equals `term`.
    async fn find(&self, term: &str) -> std::result::Result<Option<Contact>, StoreError>;

    /// Insert a new contact; a collision on either column yields
    /// [`StoreError::Conflict`], a value wider than its column yields
    /// [`StoreError::Rejected`]. Both leave the store unchanged.
    async fn insert(&self, email: &str, phone: &str) -> std::result::Result<Contact, StoreError>;
}

/// Per-conversant conversation state.
///
/// A conversant without an entry is [`ConversationState::Idle`].
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, chat: ChatId) -> Result<ConversationState>;
    async fn set(&self, chat: ChatId, state: ConversationState) -> Result<()>;
    async fn clear(&self, chat: ChatId) -> Result<()>;
}
