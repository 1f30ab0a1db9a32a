use crate::domain::ChatId;

// ============== Authorization ==============

/// Whether `chat` may run remote diagnostics.
///
/// An empty allow-list leaves `/monitor` open to everyone.
pub fn may_monitor(chat: ChatId, allowed: &[i64]) -> bool {
    allowed.is_empty() || allowed.contains(&chat.0)
}
