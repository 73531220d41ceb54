use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::error::Result;
use crate::interfaces::chat::ChatApi;
use crate::interfaces::scheduler::ScheduledJob;
use crate::roster::{mention_line, RosterResolver};
use crate::schedules::ScheduleStore;

/// Schedule id -> destination chat. Only ever populated by the /schedule
/// handler, so rows created before the last restart have no entry and are
/// never delivered.
#[derive(Default)]
pub struct ScheduleRegistry {
    inner: Mutex<HashMap<i32, i64>>,
}

impl ScheduleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, schedule_id: i32, chat_id: i64) {
        let mut guard = self.inner.lock().unwrap();
        guard.insert(schedule_id, chat_id);
    }

    pub fn chat_for(&self, schedule_id: i32) -> Option<i64> {
        let guard = self.inner.lock().unwrap();
        guard.get(&schedule_id).copied()
    }

    pub fn remove(&self, schedule_id: i32) {
        let mut guard = self.inner.lock().unwrap();
        guard.remove(&schedule_id);
    }
}

/// Scans for due scheduled messages and delivers each one once: the row is
/// deleted on success, abandoned on failure, never re-armed.
pub struct ScheduleDeliveryJob {
    api: Arc<dyn ChatApi>,
    store: Arc<ScheduleStore>,
    roster: Arc<RosterResolver>,
    registry: Arc<ScheduleRegistry>,
    interval: Duration,
}

impl ScheduleDeliveryJob {
    pub fn new(
        api: Arc<dyn ChatApi>,
        store: Arc<ScheduleStore>,
        roster: Arc<RosterResolver>,
        registry: Arc<ScheduleRegistry>,
        interval: Duration,
    ) -> Self {
        Self {
            api,
            store,
            roster,
            registry,
            interval,
        }
    }
}

#[async_trait]
impl ScheduledJob for ScheduleDeliveryJob {
    fn name(&self) -> &str {
        "schedule_delivery"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> Result<()> {
        let due = self.store.list_due(now_ts()).await?;
        for item in due {
            let Some(chat_id) = self.registry.chat_for(item.schedule_id) else {
                continue;
            };
            // Dropping the registry entry first keeps a delete failure from
            // turning into a second delivery on the next tick.
            self.registry.remove(item.schedule_id);

            let members = self.roster.resolve_all().await;
            let text = format!(
                "⏰ *Scheduled Reminder*\n\n{}\n\n{}",
                item.message,
                mention_line(&members)
            );
            match self.api.send_message(chat_id, &text).await {
                Ok(_) => {
                    self.store.delete(item.schedule_id).await?;
                    tracing::info!(schedule_id = item.schedule_id, "scheduled message delivered");
                }
                Err(err) => {
                    tracing::warn!(
                        schedule_id = item.schedule_id,
                        error = %err,
                        "scheduled message delivery failed, abandoning"
                    );
                }
            }
        }
        Ok(())
    }
}

/// Reads back pending rows after a restart. The chat id was never persisted,
/// so each one can only be reported, not re-armed.
pub async fn restore_pending(store: &ScheduleStore) -> Result<usize> {
    let pending = store.list_pending(now_ts()).await?;
    for item in &pending {
        tracing::warn!(
            schedule_id = item.schedule_id,
            message = %item.message,
            "scheduled message found but not restored (chat id was never persisted)"
        );
    }
    Ok(pending.len())
}

fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
