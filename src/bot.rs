use std::sync::Arc;
use std::time::Duration;

use crate::deadlines::DeadlineStore;
use crate::error::Result;
use crate::interfaces::chat::ChatApi;
use crate::members::MemberStore;
use crate::roster::RosterResolver;
use crate::schedules::ScheduleStore;
use crate::services::commands::{Command, CommandService};
use crate::services::deadline::DeadlineService;
use crate::services::delivery::{ScheduleDeliveryJob, ScheduleRegistry};
use crate::session::SessionMap;
use crate::telegram::types::{Message, Update};

/// Wires the stores, the roster, and the request handlers together and
/// routes each inbound update to the right one.
pub struct StudyGroupBot {
    api: Arc<dyn ChatApi>,
    members: Arc<MemberStore>,
    deadlines: Arc<DeadlineStore>,
    schedules: Arc<ScheduleStore>,
    roster: Arc<RosterResolver>,
    registry: Arc<ScheduleRegistry>,
    commands: CommandService,
    deadline: DeadlineService,
}

impl StudyGroupBot {
    pub async fn new(
        api: Arc<dyn ChatApi>,
        db_path: &str,
        seed: Vec<(i64, String)>,
    ) -> Result<Self> {
        let members = Arc::new(MemberStore::new(db_path).await?);
        let deadlines = Arc::new(DeadlineStore::new(db_path).await?);
        let schedules = Arc::new(ScheduleStore::new(db_path).await?);
        let roster = Arc::new(RosterResolver::new(seed, members.clone()));
        let sessions = Arc::new(SessionMap::new());
        let registry = Arc::new(ScheduleRegistry::new());

        let commands = CommandService::new(
            api.clone(),
            roster.clone(),
            deadlines.clone(),
            schedules.clone(),
            registry.clone(),
        );
        let deadline = DeadlineService::new(
            api.clone(),
            deadlines.clone(),
            roster.clone(),
            sessions.clone(),
        );

        Ok(Self {
            api,
            members,
            deadlines,
            schedules,
            roster,
            registry,
            commands,
            deadline,
        })
    }

    pub fn deadlines(&self) -> &Arc<DeadlineStore> {
        &self.deadlines
    }

    pub fn schedules(&self) -> &Arc<ScheduleStore> {
        &self.schedules
    }

    pub fn members(&self) -> &Arc<MemberStore> {
        &self.members
    }

    pub fn delivery_job(&self, interval: Duration) -> ScheduleDeliveryJob {
        ScheduleDeliveryJob::new(
            self.api.clone(),
            self.schedules.clone(),
            self.roster.clone(),
            self.registry.clone(),
            interval,
        )
    }

    /// Handler-boundary error policy: a failed request is reported to the
    /// chat generically and logged; it never takes the process down.
    pub async fn handle_update(&self, update: Update) {
        if let Some(query) = update.callback_query {
            if let Err(err) = self.deadline.handle_callback(&query).await {
                tracing::error!(error = %err, "callback handling failed");
                let _ = self
                    .api
                    .answer_callback_query(&query.id, "❌ Error recording completion", true)
                    .await;
            }
            return;
        }

        let Some(message) = update.message else {
            return;
        };

        self.auto_register(&message).await;

        if let Err(err) = self.route_message(&message).await {
            tracing::error!(chat_id = message.chat.id, error = %err, "update handling failed");
            let _ = self
                .api
                .send_message(message.chat.id, "❌ Something went wrong, please try again.")
                .await;
        }
    }

    async fn route_message(&self, message: &Message) -> Result<()> {
        if let Some(command) = message.text.as_deref().and_then(Command::parse) {
            return self.dispatch_command(message, command).await;
        }
        self.deadline.handle_session_message(message).await
    }

    async fn dispatch_command(&self, message: &Message, command: Command) -> Result<()> {
        match command {
            Command::Start => self.commands.start(message).await,
            Command::Help => self.commands.help(message).await,
            Command::Mention { text } => self.commands.mention(message, text.as_deref()).await,
            Command::Status => self.commands.group_status(message).await,
            Command::Deadline { args } => self.deadline.handle_command(message, &args).await,
            Command::Schedule { args } => self.commands.schedule(message, &args).await,
            Command::Cancel => self.deadline.cancel(message).await,
            Command::Unknown => Ok(()),
        }
    }

    /// Silent upsert of every non-bot group participant.
    async fn auto_register(&self, message: &Message) {
        if !message.chat.is_group() {
            return;
        }
        let Some(from) = &message.from else {
            return;
        };
        if from.is_bot {
            return;
        }
        let name = from
            .first_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or("User");
        if let Err(err) = self.members.upsert(from.id, name).await {
            tracing::warn!(user_id = from.id, error = %err, "auto-registration failed");
        }
    }
}
