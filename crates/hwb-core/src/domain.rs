/// Telegram chat id (numeric).
///
/// Conversation state is keyed by chat, so this doubles as the conversant id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// A stored contact row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contact {
    pub id: i32,
    pub email: String,
    pub phone: String,
}
