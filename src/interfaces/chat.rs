use async_trait::async_trait;

use crate::error::Result;
use crate::telegram::types::{Attachment, InlineKeyboardMarkup, Message};

/// The outbound surface the handlers depend on. Every operation is a single
/// attempt; any retrying belongs to the transport underneath.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<Message>;

    async fn send_attachment(
        &self,
        chat_id: i64,
        attachment: &Attachment,
        caption: &str,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<Message>;

    async fn edit_message_caption(
        &self,
        chat_id: i64,
        message_id: i64,
        caption: &str,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<()>;

    async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: &str,
        show_alert: bool,
    ) -> Result<()>;

    async fn chat_member_status(&self, chat_id: i64, user_id: i64) -> Result<String>;

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()>;
}
