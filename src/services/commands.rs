use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::deadlines::DeadlineStore;
use crate::error::Result;
use crate::interfaces::chat::ChatApi;
use crate::roster::{mention_line, RosterResolver};
use crate::schedules::ScheduleStore;
use crate::services::delivery::ScheduleRegistry;
use crate::services::is_admin;
use crate::telegram::types::Message;

const RUN_TIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Mention { text: Option<String> },
    Status,
    Deadline { args: Vec<String> },
    Schedule { args: Vec<String> },
    Cancel,
    Unknown,
}

impl Command {
    /// Returns None for anything that is not a slash command.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if !trimmed.starts_with('/') {
            return None;
        }
        let mut parts = trimmed.split_whitespace();
        let head = parts.next()?;
        let name = head
            .trim_start_matches('/')
            .split('@')
            .next()
            .unwrap_or_default();
        let args: Vec<String> = parts.map(|part| part.to_string()).collect();
        Some(match name {
            "start" => Self::Start,
            "help" => Self::Help,
            "mention" | "tagall" => Self::Mention {
                text: if args.is_empty() {
                    None
                } else {
                    Some(args.join(" "))
                },
            },
            "status" => Self::Status,
            "deadline" => Self::Deadline { args },
            "schedule" => Self::Schedule { args },
            "cancel" => Self::Cancel,
            _ => Self::Unknown,
        })
    }
}

pub struct CommandService {
    api: Arc<dyn ChatApi>,
    roster: Arc<RosterResolver>,
    deadlines: Arc<DeadlineStore>,
    schedules: Arc<ScheduleStore>,
    registry: Arc<ScheduleRegistry>,
}

impl CommandService {
    pub fn new(
        api: Arc<dyn ChatApi>,
        roster: Arc<RosterResolver>,
        deadlines: Arc<DeadlineStore>,
        schedules: Arc<ScheduleStore>,
        registry: Arc<ScheduleRegistry>,
    ) -> Self {
        Self {
            api,
            roster,
            deadlines,
            schedules,
            registry,
        }
    }

    pub async fn start(&self, message: &Message) -> Result<()> {
        self.api
            .send_message(
                message.chat.id,
                "📚 *Study Group Management Bot*\n\n\
                 Welcome! This bot helps manage study materials and deadlines.\n\n\
                 Use /help to see all available commands.\n\n\
                 💡 You're automatically registered when you send any message!",
            )
            .await?;
        Ok(())
    }

    pub async fn help(&self, message: &Message) -> Result<()> {
        self.api
            .send_message(
                message.chat.id,
                concat!(
                    "📚 *Study Group Bot Commands*\n\n",
                    "🔔 /mention - Notify all registered students (admin only)\n",
                    "   Example: `/mention Important announcement`\n\n",
                    "📎 /deadline <title> - Post study material & track completion\n",
                    "   • `/deadline Assignment 1` - Start posting a deadline\n",
                    "   • `/deadline status` - View completion stats\n",
                    "   • `/deadline remind` - Remind pending students\n\n",
                    "⏰ /schedule YYYY-MM-DD HH:MM <message> - Schedule reminder\n",
                    "   Example: `/schedule 2026-02-15 09:00 Class today!`\n",
                    "   ⚠️ Time is in UTC\n\n",
                    "📊 /status - Show group statistics\n",
                    "ℹ️ /help - Show this message\n\n",
                    "💡 *Auto-Registration*\n",
                    "All members are automatically registered when they send any message in the group!",
                ),
            )
            .await?;
        Ok(())
    }

    pub async fn mention(&self, message: &Message, text: Option<&str>) -> Result<()> {
        if !message.chat.is_group() {
            self.api
                .send_message(message.chat.id, "⚠️ This command only works in groups.")
                .await?;
            return Ok(());
        }
        if !is_admin(self.api.as_ref(), message).await {
            self.api
                .send_message(message.chat.id, "❌ Only admins can use /mention")
                .await?;
            return Ok(());
        }

        let members = self.roster.resolve_all().await;
        if members.is_empty() {
            self.api
                .send_message(
                    message.chat.id,
                    "⚠️ No members registered yet!\n\n\
                     Members are auto-registered when they send any message in the group.",
                )
                .await?;
            return Ok(());
        }

        let mentions = mention_line(&members);
        let body = match text {
            Some(text) => format!("📢 *Notification*\n\n{text}\n\n{mentions}"),
            None => format!("📢 *Mention All*\n\n{mentions}"),
        };
        self.api.send_message(message.chat.id, &body).await?;

        // Drop the triggering command for a cleaner chat; losing it is fine.
        if let Err(err) = self
            .api
            .delete_message(message.chat.id, message.message_id)
            .await
        {
            tracing::debug!(error = %err, "could not delete /mention command message");
        }
        Ok(())
    }

    pub async fn group_status(&self, message: &Message) -> Result<()> {
        if !is_admin(self.api.as_ref(), message).await {
            self.api
                .send_message(message.chat.id, "❌ Only admins can use /status")
                .await?;
            return Ok(());
        }

        let member_count = self.roster.member_count().await;
        let deadline_count = self.deadlines.count().await?;
        let latest = self.deadlines.latest().await?;

        let mut text = format!(
            "📊 *Group Statistics*\n\n👥 Total Members: *{member_count}*\n📎 Total Deadlines: *{deadline_count}*\n"
        );
        match latest {
            Some(deadline) => {
                text.push_str(&format!(
                    "📌 Latest Deadline: *{}*\n   Posted: {}\n",
                    deadline.title,
                    format_ts(deadline.created_at)
                ));
            }
            None => text.push_str("📌 Latest Deadline: *None*\n"),
        }
        self.api.send_message(message.chat.id, &text).await?;
        Ok(())
    }

    pub async fn schedule(&self, message: &Message, args: &[String]) -> Result<()> {
        if !is_admin(self.api.as_ref(), message).await {
            self.api
                .send_message(message.chat.id, "❌ Only admins can use /schedule")
                .await?;
            return Ok(());
        }

        if args.len() < 3 {
            self.api
                .send_message(
                    message.chat.id,
                    "⏰ *Schedule Command Usage*\n\n\
                     `/schedule YYYY-MM-DD HH:MM <message>`\n\n\
                     *Example:*\n\
                     `/schedule 2026-02-15 09:00 Class starting soon!`\n\n\
                     ⚠️ Time is in UTC",
                )
                .await?;
            return Ok(());
        }

        let Some(run_time) = parse_run_time(&args[0], &args[1]) else {
            self.api
                .send_message(
                    message.chat.id,
                    "❌ Invalid date/time format!\n\n\
                     Use: `YYYY-MM-DD HH:MM`\n\
                     Example: `2026-02-15 09:00`",
                )
                .await?;
            return Ok(());
        };
        if run_time <= now_ts() {
            self.api
                .send_message(message.chat.id, "⚠️ Scheduled time must be in the future!")
                .await?;
            return Ok(());
        }

        let text = args[2..].join(" ");
        let scheduled = self.schedules.create(run_time, &text).await?;
        // The chat id is only held in memory; a restart orphans the row.
        self.registry
            .insert(scheduled.schedule_id, message.chat.id);

        self.api
            .send_message(
                message.chat.id,
                &format!(
                    "✅ *Reminder Scheduled*\n\n📅 Date: {}\n🕐 Time: {} UTC\n💬 Message: {}",
                    args[0], args[1], text
                ),
            )
            .await?;
        Ok(())
    }
}

pub(crate) fn parse_run_time(date: &str, time_arg: &str) -> Option<i64> {
    PrimitiveDateTime::parse(&format!("{date} {time_arg}"), RUN_TIME_FORMAT)
        .ok()
        .map(|parsed| parsed.assume_utc().unix_timestamp())
}

fn format_ts(ts: i64) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute] UTC");
    OffsetDateTime::from_unix_timestamp(ts)
        .ok()
        .and_then(|dt| dt.format(&format).ok())
        .unwrap_or_else(|| ts.to_string())
}

fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
