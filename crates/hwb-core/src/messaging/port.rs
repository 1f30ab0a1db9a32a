use async_trait::async_trait;

use crate::{
    conversation::Reply,
    domain::ChatId,
    formatting::render_reply,
    Result,
};

/// Cross-messenger port.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    /// Largest message body the messenger accepts safely, in bytes.
    fn safe_message_len(&self) -> usize;

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<()>;

    /// Render `reply` and send it, split over several messages if needed.
    async fn send_reply(&self, chat_id: ChatId, reply: &Reply) -> Result<()> {
        for chunk in render_reply(reply, self.safe_message_len()) {
            self.send_html(chat_id, &chunk).await?;
        }
        Ok(())
    }
}
