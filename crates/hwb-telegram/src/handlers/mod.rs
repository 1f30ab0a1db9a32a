//! Telegram update handlers.
//!
//! Text turns are serialized per chat and handed to the core controller; the
//! reply (if any) goes back through the messenger port.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};
use tracing::error;

use hwb_core::domain::ChatId;

use crate::router::AppState;

pub const INTERNAL_ERROR: &str = "Something went wrong. Please try again.";

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let chat = ChatId(msg.chat.id.0);
    handle_text(&state, chat, text).await;
    Ok(())
}

/// One conversational turn. Failures are logged and answered, never propagated.
pub async fn handle_text(state: &AppState, chat: ChatId, text: &str) {
    let _guard = state.chat_locks.lock_chat(chat.0).await;

    let reply = match state.controller.handle(chat, text).await {
        Ok(Some(reply)) => reply,
        Ok(None) => return,
        Err(e) => {
            error!(chat = chat.0, "turn failed: {e}");
            hwb_core::conversation::Reply::text(INTERNAL_ERROR)
        }
    };

    if let Err(e) = state.messenger.send_reply(chat, &reply).await {
        error!(chat = chat.0, "failed to send reply: {e}");
    }
}
