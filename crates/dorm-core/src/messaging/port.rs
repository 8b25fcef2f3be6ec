use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::{InlineKeyboard, MessagingCapabilities},
    Result,
};

/// Outbound messaging port.
///
/// Every call may fail independently; adapters map "this chat can no longer be
/// reached" to `Error::RecipientUnavailable` so callers can tell it apart from
/// transient transport errors.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;
    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()>;

    /// `file_ref` is the platform's opaque file reference.
    async fn send_photo(
        &self,
        chat_id: ChatId,
        file_ref: &str,
        caption_html: Option<&str>,
    ) -> Result<MessageRef>;

    async fn send_video(
        &self,
        chat_id: ChatId,
        file_ref: &str,
        caption_html: Option<&str>,
    ) -> Result<MessageRef>;

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef>;

    async fn edit_inline_keyboard(
        &self,
        msg: MessageRef,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<()>;

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()>;
}
