use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
    pub document: Option<Document>,
    pub photo: Option<Vec<PhotoSize>>,
    pub video: Option<Video>,
}

impl Message {
    /// The single attachment a deadline posting accepts, if present.
    /// Photos arrive in ascending sizes; the last entry is the largest.
    pub fn attachment(&self) -> Option<Attachment> {
        if let Some(document) = &self.document {
            return Some(Attachment::Document(document.file_id.clone()));
        }
        if let Some(photo) = self.photo.as_ref().and_then(|sizes| sizes.last()) {
            return Some(Attachment::Photo(photo.file_id.clone()));
        }
        if let Some(video) = &self.video {
            return Some(Attachment::Video(video.file_id.clone()));
        }
        None
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Chat {
    pub fn is_group(&self) -> bool {
        matches!(self.kind.as_str(), "group" | "supergroup")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Video {
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMemberInfo {
    pub status: String,
}

#[derive(Debug, Clone)]
pub enum Attachment {
    Document(String),
    Photo(String),
    Video(String),
}

impl Attachment {
    pub fn file_id(&self) -> &str {
        match self {
            Attachment::Document(id) | Attachment::Photo(id) | Attachment::Video(id) => id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
    pub fn single_button(text: &str, callback_data: &str) -> Self {
        Self {
            inline_keyboard: vec![vec![InlineKeyboardButton {
                text: text.to_string(),
                callback_data: callback_data.to_string(),
            }]],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_prefers_largest_photo_size() {
        let message: Message = serde_json::from_value(serde_json::json!({
            "message_id": 1,
            "chat": {"id": -100, "type": "group"},
            "photo": [
                {"file_id": "small", "width": 90, "height": 90},
                {"file_id": "large", "width": 800, "height": 800}
            ]
        }))
        .unwrap();
        match message.attachment() {
            Some(Attachment::Photo(id)) => assert_eq!(id, "large"),
            other => panic!("unexpected attachment: {other:?}"),
        }
    }

    #[test]
    fn attachment_absent_for_plain_text() {
        let message: Message = serde_json::from_value(serde_json::json!({
            "message_id": 1,
            "chat": {"id": -100, "type": "group"},
            "text": "hello"
        }))
        .unwrap();
        assert!(message.attachment().is_none());
    }
}
