use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::{Result, StudyGroupBotError};
use crate::interfaces::chat::ChatApi;

pub mod types;

use types::{
    ApiResponse, Attachment, ChatMemberInfo, InlineKeyboardMarkup, Message, Update,
};

const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Thin JSON client for the Telegram Bot API. Long polling and the outbound
/// operations share one `call` path through the standard response envelope.
pub struct TelegramApi {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl TelegramApi {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_url(token, DEFAULT_API_URL)
    }

    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self> {
        // The timeout must outlast a full long-poll cycle.
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| StudyGroupBotError::Http(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, payload: Value) -> Result<T> {
        let url = format!("{}/bot{}/{}", self.base_url, self.token, method);
        let response = self
            .http
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| StudyGroupBotError::Http(e.to_string()))?;
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| StudyGroupBotError::Serialization(e.to_string()))?;
        if !envelope.ok {
            let description = envelope
                .description
                .unwrap_or_else(|| "unknown api error".to_string());
            if envelope.error_code == Some(409) {
                return Err(StudyGroupBotError::Conflict(description));
            }
            return Err(StudyGroupBotError::Http(description));
        }
        envelope
            .result
            .ok_or_else(|| StudyGroupBotError::Serialization("missing result payload".to_string()))
    }

    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let mut payload = json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            payload["offset"] = json!(offset);
        }
        self.call("getUpdates", payload).await
    }

    pub async fn delete_webhook(&self) -> Result<bool> {
        self.call("deleteWebhook", json!({"drop_pending_updates": true}))
            .await
    }
}

#[async_trait]
impl ChatApi for TelegramApi {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<Message> {
        self.call(
            "sendMessage",
            json!({"chat_id": chat_id, "text": text, "parse_mode": "Markdown"}),
        )
        .await
    }

    async fn send_attachment(
        &self,
        chat_id: i64,
        attachment: &Attachment,
        caption: &str,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<Message> {
        let (method, field, file_id) = match attachment {
            Attachment::Document(id) => ("sendDocument", "document", id),
            Attachment::Photo(id) => ("sendPhoto", "photo", id),
            Attachment::Video(id) => ("sendVideo", "video", id),
        };
        let mut payload = json!({
            "chat_id": chat_id,
            field: file_id,
            "caption": caption,
            "parse_mode": "Markdown",
        });
        if let Some(markup) = reply_markup {
            payload["reply_markup"] = serde_json::to_value(markup)
                .map_err(|e| StudyGroupBotError::Serialization(e.to_string()))?;
        }
        self.call(method, payload).await
    }

    async fn edit_message_caption(
        &self,
        chat_id: i64,
        message_id: i64,
        caption: &str,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        let mut payload = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "caption": caption,
            "parse_mode": "Markdown",
        });
        if let Some(markup) = reply_markup {
            payload["reply_markup"] = serde_json::to_value(markup)
                .map_err(|e| StudyGroupBotError::Serialization(e.to_string()))?;
        }
        let _: Value = self.call("editMessageCaption", payload).await?;
        Ok(())
    }

    async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: &str,
        show_alert: bool,
    ) -> Result<()> {
        let _: Value = self
            .call(
                "answerCallbackQuery",
                json!({
                    "callback_query_id": callback_query_id,
                    "text": text,
                    "show_alert": show_alert,
                }),
            )
            .await?;
        Ok(())
    }

    async fn chat_member_status(&self, chat_id: i64, user_id: i64) -> Result<String> {
        let member: ChatMemberInfo = self
            .call(
                "getChatMember",
                json!({"chat_id": chat_id, "user_id": user_id}),
            )
            .await?;
        Ok(member.status)
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()> {
        let _: Value = self
            .call(
                "deleteMessage",
                json!({"chat_id": chat_id, "message_id": message_id}),
            )
            .await?;
        Ok(())
    }
}
