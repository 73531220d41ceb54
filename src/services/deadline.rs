use std::collections::HashSet;
use std::sync::Arc;

use crate::deadlines::DeadlineStore;
use crate::error::Result;
use crate::interfaces::chat::ChatApi;
use crate::roster::{mention_line, RosterResolver};
use crate::services::is_admin;
use crate::session::{SessionKey, SessionMap};
use crate::telegram::types::{Attachment, CallbackQuery, InlineKeyboardMarkup, Message};

const COMPLETE_BUTTON: &str = "✅ Mark as Completed";

/// The deadline workflow: collect a title, wait for a file, post it with a
/// completion button, and keep the per-user completion ledger.
pub struct DeadlineService {
    api: Arc<dyn ChatApi>,
    store: Arc<DeadlineStore>,
    roster: Arc<RosterResolver>,
    sessions: Arc<SessionMap>,
}

impl DeadlineService {
    pub fn new(
        api: Arc<dyn ChatApi>,
        store: Arc<DeadlineStore>,
        roster: Arc<RosterResolver>,
        sessions: Arc<SessionMap>,
    ) -> Self {
        Self {
            api,
            store,
            roster,
            sessions,
        }
    }

    pub async fn handle_command(&self, message: &Message, args: &[String]) -> Result<()> {
        if !is_admin(self.api.as_ref(), message).await {
            self.api
                .send_message(message.chat.id, "❌ Only admins can use /deadline")
                .await?;
            return Ok(());
        }

        match args.first().map(|arg| arg.as_str()) {
            None => {
                self.api
                    .send_message(
                        message.chat.id,
                        "📎 *Deadline Command Usage*\n\n\
                         `/deadline <title>` - Post study material\n\
                         `/deadline status` - View completion stats\n\
                         `/deadline remind` - Remind pending students",
                    )
                    .await?;
                Ok(())
            }
            Some("status") => self.status(message).await,
            Some("remind") => self.remind(message).await,
            Some(_) => {
                let Some(from) = &message.from else {
                    return Ok(());
                };
                let title = args.join(" ");
                self.sessions.begin(
                    SessionKey {
                        chat_id: message.chat.id,
                        user_id: from.id,
                    },
                    &title,
                );
                self.api
                    .send_message(
                        message.chat.id,
                        &format!(
                            "📎 *Creating Deadline: {title}*\n\n\
                             Please send the study material file (document, photo, or video)"
                        ),
                    )
                    .await?;
                Ok(())
            }
        }
    }

    /// Non-command message while a session is awaiting its file.
    pub async fn handle_session_message(&self, message: &Message) -> Result<()> {
        let Some(from) = &message.from else {
            return Ok(());
        };
        let key = SessionKey {
            chat_id: message.chat.id,
            user_id: from.id,
        };
        let Some(title) = self.sessions.pending_title(key) else {
            return Ok(());
        };

        let Some(attachment) = message.attachment() else {
            self.api
                .send_message(
                    message.chat.id,
                    "⚠️ Please send a valid file (document, photo, or video)",
                )
                .await?;
            return Ok(());
        };

        // The session ends here either way; a failed post is reported by the
        // caller and the inserted row is left behind with message id 0.
        let outcome = self.post(message.chat.id, &title, &attachment).await;
        self.sessions.clear(key);
        outcome
    }

    async fn post(&self, chat_id: i64, title: &str, attachment: &Attachment) -> Result<()> {
        let deadline = self.store.create(title, chat_id, attachment.file_id()).await?;

        let caption = format!("📌 *Deadline: {title}*\n\nClick button when completed.");
        let markup = InlineKeyboardMarkup::single_button(
            COMPLETE_BUTTON,
            &format!("complete_{}", deadline.deadline_id),
        );
        let posted = self
            .api
            .send_attachment(chat_id, attachment, &caption, Some(markup))
            .await?;
        self.store
            .set_message_id(deadline.deadline_id, posted.message_id)
            .await?;

        self.api
            .send_message(chat_id, "✅ Deadline posted successfully!")
            .await?;
        Ok(())
    }

    pub async fn cancel(&self, message: &Message) -> Result<()> {
        let Some(from) = &message.from else {
            return Ok(());
        };
        let cleared = self.sessions.clear(SessionKey {
            chat_id: message.chat.id,
            user_id: from.id,
        });
        if cleared {
            self.api
                .send_message(message.chat.id, "❌ Deadline creation cancelled.")
                .await?;
        }
        Ok(())
    }

    /// Completion button press. Open to every participant, idempotent per
    /// (deadline, user); the tally is always recomputed from the store.
    pub async fn handle_callback(&self, query: &CallbackQuery) -> Result<()> {
        let Some(deadline_id) = query
            .data
            .as_deref()
            .and_then(parse_completion_callback)
        else {
            return Ok(());
        };

        let Some(deadline) = self.store.get(deadline_id).await? else {
            self.api
                .answer_callback_query(&query.id, "❌ This deadline no longer exists.", true)
                .await?;
            return Ok(());
        };

        let inserted = self.store.record_completion(deadline_id, query.from.id).await?;
        if !inserted {
            self.api
                .answer_callback_query(&query.id, "✅ You already marked this as completed!", true)
                .await?;
            return Ok(());
        }

        let completed = self.store.completion_count(deadline_id).await?;
        let total = self.roster.member_count().await;

        let caption = format!(
            "📌 *Deadline: {}*\n\nClick button when completed.\n\n✅ Completed: *{completed} / {total}*",
            deadline.title
        );
        let markup =
            InlineKeyboardMarkup::single_button(COMPLETE_BUTTON, &format!("complete_{deadline_id}"));
        if let Err(err) = self
            .api
            .edit_message_caption(deadline.chat_id, deadline.message_id, &caption, Some(markup))
            .await
        {
            tracing::warn!(deadline_id, error = %err, "failed to rewrite deadline tally");
        }

        self.api
            .answer_callback_query(
                &query.id,
                &format!("✅ Marked as completed! ({completed}/{total})"),
                true,
            )
            .await?;
        Ok(())
    }

    async fn status(&self, message: &Message) -> Result<()> {
        let rows = self.store.list_with_counts().await?;
        if rows.is_empty() {
            self.api
                .send_message(message.chat.id, "📎 No deadlines posted yet.")
                .await?;
            return Ok(());
        }

        let total = self.roster.member_count().await as i64;
        let mut text = String::from("📊 *Deadline Status*\n\n");
        for row in rows {
            let pending = total - row.completed;
            text.push_str(&format!(
                "📌 *{}*\n   ✅ Completed: {}\n   ⏳ Pending: {}\n\n",
                row.deadline.title, row.completed, pending
            ));
        }
        self.api.send_message(message.chat.id, &text).await?;
        Ok(())
    }

    async fn remind(&self, message: &Message) -> Result<()> {
        let Some(latest) = self.store.latest().await? else {
            self.api
                .send_message(message.chat.id, "📎 No deadlines posted yet.")
                .await?;
            return Ok(());
        };

        let members = self.roster.resolve_all().await;
        let completed: HashSet<i64> = self
            .store
            .completed_user_ids(latest.deadline_id)
            .await?
            .into_iter()
            .collect();
        let pending: Vec<(i64, String)> = members
            .into_iter()
            .filter(|(id, _)| !completed.contains(id))
            .collect();

        if pending.is_empty() {
            self.api
                .send_message(
                    message.chat.id,
                    &format!("✅ Everyone has completed: *{}*", latest.title),
                )
                .await?;
            return Ok(());
        }

        let mentions = mention_line(&pending);
        self.api
            .send_message(
                message.chat.id,
                &format!(
                    "⏰ *Reminder: {}*\n\nPending students ({}):\n{}",
                    latest.title,
                    pending.len(),
                    mentions
                ),
            )
            .await?;
        Ok(())
    }
}

fn parse_completion_callback(data: &str) -> Option<i32> {
    data.strip_prefix("complete_")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_callback_parsing() {
        assert_eq!(parse_completion_callback("complete_7"), Some(7));
        assert_eq!(parse_completion_callback("complete_"), None);
        assert_eq!(parse_completion_callback("complete_x"), None);
        assert_eq!(parse_completion_callback("other_7"), None);
    }
}
