#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::NamedTempFile;

use studygroup_bot::error::{Result, StudyGroupBotError};
use studygroup_bot::interfaces::chat::ChatApi;
use studygroup_bot::telegram::types::{
    Attachment, CallbackQuery, Chat, Document, InlineKeyboardMarkup, Message, Update, User,
};
use studygroup_bot::StudyGroupBot;

#[derive(Debug, Clone)]
pub enum Outbound {
    Text {
        chat_id: i64,
        text: String,
    },
    Attachment {
        chat_id: i64,
        caption: String,
        callback_data: Option<String>,
    },
    CaptionEdit {
        chat_id: i64,
        message_id: i64,
        caption: String,
    },
    CallbackAnswer {
        callback_query_id: String,
        text: String,
    },
    Deleted {
        chat_id: i64,
        message_id: i64,
    },
}

pub struct MockChatApi {
    sent: Mutex<Vec<Outbound>>,
    admins: Mutex<HashSet<i64>>,
    next_message_id: AtomicI64,
    pub fail_attachments: AtomicBool,
    pub fail_sends: AtomicBool,
}

impl MockChatApi {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            admins: Mutex::new(HashSet::new()),
            next_message_id: AtomicI64::new(100),
            fail_attachments: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
        }
    }

    pub fn grant_admin(&self, user_id: i64) {
        self.admins.lock().unwrap().insert(user_id);
    }

    pub fn outbound(&self) -> Vec<Outbound> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.outbound()
            .into_iter()
            .filter_map(|item| match item {
                Outbound::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn last_text(&self) -> Option<String> {
        self.texts().into_iter().last()
    }

    pub fn callback_answers(&self) -> Vec<String> {
        self.outbound()
            .into_iter()
            .filter_map(|item| match item {
                Outbound::CallbackAnswer { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn caption_edits(&self) -> Vec<String> {
        self.outbound()
            .into_iter()
            .filter_map(|item| match item {
                Outbound::CaptionEdit { caption, .. } => Some(caption),
                _ => None,
            })
            .collect()
    }

    fn reply(&self, chat_id: i64) -> Message {
        Message {
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
            from: None,
            chat: group_chat(chat_id),
            text: None,
            document: None,
            photo: None,
            video: None,
        }
    }
}

#[async_trait]
impl ChatApi for MockChatApi {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<Message> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(StudyGroupBotError::Http("send failed".to_string()));
        }
        self.sent.lock().unwrap().push(Outbound::Text {
            chat_id,
            text: text.to_string(),
        });
        Ok(self.reply(chat_id))
    }

    async fn send_attachment(
        &self,
        chat_id: i64,
        _attachment: &Attachment,
        caption: &str,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<Message> {
        if self.fail_attachments.load(Ordering::SeqCst) {
            return Err(StudyGroupBotError::Http("attachment send failed".to_string()));
        }
        let callback_data = reply_markup
            .as_ref()
            .and_then(|markup| markup.inline_keyboard.first())
            .and_then(|row| row.first())
            .map(|button| button.callback_data.clone());
        self.sent.lock().unwrap().push(Outbound::Attachment {
            chat_id,
            caption: caption.to_string(),
            callback_data,
        });
        Ok(self.reply(chat_id))
    }

    async fn edit_message_caption(
        &self,
        chat_id: i64,
        message_id: i64,
        caption: &str,
        _reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        self.sent.lock().unwrap().push(Outbound::CaptionEdit {
            chat_id,
            message_id,
            caption: caption.to_string(),
        });
        Ok(())
    }

    async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: &str,
        _show_alert: bool,
    ) -> Result<()> {
        self.sent.lock().unwrap().push(Outbound::CallbackAnswer {
            callback_query_id: callback_query_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn chat_member_status(&self, _chat_id: i64, user_id: i64) -> Result<String> {
        if self.admins.lock().unwrap().contains(&user_id) {
            Ok("administrator".to_string())
        } else {
            Ok("member".to_string())
        }
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()> {
        self.sent.lock().unwrap().push(Outbound::Deleted {
            chat_id,
            message_id,
        });
        Ok(())
    }
}

pub fn group_chat(id: i64) -> Chat {
    Chat {
        id,
        kind: "group".to_string(),
    }
}

pub fn user(id: i64, name: &str) -> User {
    User {
        id,
        is_bot: false,
        first_name: Some(name.to_string()),
    }
}

pub fn text_message(chat_id: i64, from: User, text: &str) -> Message {
    Message {
        message_id: 1,
        from: Some(from),
        chat: group_chat(chat_id),
        text: Some(text.to_string()),
        document: None,
        photo: None,
        video: None,
    }
}

pub fn document_message(chat_id: i64, from: User, file_id: &str) -> Message {
    Message {
        message_id: 2,
        from: Some(from),
        chat: group_chat(chat_id),
        text: None,
        document: Some(Document {
            file_id: file_id.to_string(),
        }),
        photo: None,
        video: None,
    }
}

pub fn message_update(message: Message) -> Update {
    Update {
        update_id: 0,
        message: Some(message),
        callback_query: None,
    }
}

pub fn callback_update(from: User, data: &str) -> Update {
    Update {
        update_id: 0,
        message: None,
        callback_query: Some(CallbackQuery {
            id: "cb-1".to_string(),
            from,
            message: None,
            data: Some(data.to_string()),
        }),
    }
}

pub fn seed(entries: &[(i64, &str)]) -> Vec<(i64, String)> {
    entries
        .iter()
        .map(|(id, name)| (*id, name.to_string()))
        .collect()
}

pub async fn test_bot(
    api: Arc<MockChatApi>,
    seed_members: Vec<(i64, String)>,
) -> (StudyGroupBot, NamedTempFile) {
    let db = NamedTempFile::new().unwrap();
    let bot = StudyGroupBot::new(api, db.path().to_str().unwrap(), seed_members)
        .await
        .unwrap();
    (bot, db)
}
