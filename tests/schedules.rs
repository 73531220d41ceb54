mod common;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tempfile::NamedTempFile;

use common::{message_update, seed, test_bot, text_message, user, MockChatApi};
use studygroup_bot::interfaces::scheduler::ScheduledJob;
use studygroup_bot::members::MemberStore;
use studygroup_bot::roster::RosterResolver;
use studygroup_bot::schedules::ScheduleStore;
use studygroup_bot::services::delivery::{restore_pending, ScheduleDeliveryJob, ScheduleRegistry};

const CHAT: i64 = -1001;

fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

struct Fixture {
    api: Arc<MockChatApi>,
    store: Arc<ScheduleStore>,
    registry: Arc<ScheduleRegistry>,
    job: ScheduleDeliveryJob,
    _db: NamedTempFile,
}

async fn fixture() -> Fixture {
    let db = NamedTempFile::new().unwrap();
    let path = db.path().to_str().unwrap().to_string();
    let api = Arc::new(MockChatApi::new());
    let store = Arc::new(ScheduleStore::new(&path).await.unwrap());
    let members = Arc::new(MemberStore::new(&path).await.unwrap());
    let roster = Arc::new(RosterResolver::new(seed(&[(1, "A"), (2, "B")]), members));
    let registry = Arc::new(ScheduleRegistry::new());
    let job = ScheduleDeliveryJob::new(
        api.clone(),
        store.clone(),
        roster,
        registry.clone(),
        Duration::from_secs(1),
    );
    Fixture {
        api,
        store,
        registry,
        job,
        _db: db,
    }
}

#[tokio::test]
async fn past_and_malformed_schedule_requests_are_rejected() {
    let api = Arc::new(MockChatApi::new());
    api.grant_admin(1);
    let (bot, _db) = test_bot(api.clone(), seed(&[(1, "A")])).await;

    bot.handle_update(message_update(text_message(
        CHAT,
        user(1, "A"),
        "/schedule 2020-01-01 00:00 Too late",
    )))
    .await;
    assert!(api.last_text().unwrap().contains("must be in the future"));

    bot.handle_update(message_update(text_message(
        CHAT,
        user(1, "A"),
        "/schedule tomorrow 09:00 Bad date",
    )))
    .await;
    assert!(api.last_text().unwrap().contains("Invalid date/time format"));

    bot.handle_update(message_update(text_message(CHAT, user(1, "A"), "/schedule")))
        .await;
    assert!(api.last_text().unwrap().contains("Schedule Command Usage"));

    assert!(bot.schedules().list_pending(0).await.unwrap().is_empty());
}

#[tokio::test]
async fn future_schedule_is_persisted_and_confirmed() {
    let api = Arc::new(MockChatApi::new());
    api.grant_admin(1);
    let (bot, _db) = test_bot(api.clone(), seed(&[(1, "A")])).await;

    bot.handle_update(message_update(text_message(
        CHAT,
        user(1, "A"),
        "/schedule 2999-01-01 12:00 Class starting soon!",
    )))
    .await;
    assert!(api.last_text().unwrap().contains("Reminder Scheduled"));

    let pending = bot.schedules().list_pending(now_ts()).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].message, "Class starting soon!");
}

#[tokio::test]
async fn due_schedule_is_delivered_once_and_deleted() {
    let fx = fixture().await;
    let item = fx.store.create(now_ts() - 5, "Class today!").await.unwrap();
    fx.registry.insert(item.schedule_id, CHAT);

    fx.job.run().await.unwrap();

    let texts = fx.api.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("Class today!"));
    assert!(texts[0].contains("[A](tg://user?id=1)"));
    assert!(texts[0].contains("[B](tg://user?id=2)"));
    assert!(fx.store.list_due(now_ts()).await.unwrap().is_empty());

    // A second tick finds nothing; the delete committed the delivery.
    fx.job.run().await.unwrap();
    assert_eq!(fx.api.texts().len(), 1);
}

#[tokio::test]
async fn due_row_without_registered_chat_is_left_alone() {
    let fx = fixture().await;
    fx.store.create(now_ts() - 5, "Orphaned").await.unwrap();

    fx.job.run().await.unwrap();

    assert!(fx.api.texts().is_empty());
    assert_eq!(fx.store.list_due(now_ts()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn restore_reports_pending_rows_without_delivering() {
    let fx = fixture().await;
    fx.store.create(now_ts() + 3600, "After restart").await.unwrap();
    fx.store.create(now_ts() - 3600, "Already overdue").await.unwrap();

    let restored = restore_pending(&fx.store).await.unwrap();
    // Only still-future rows are reported; nothing is sent either way.
    assert_eq!(restored, 1);
    assert!(fx.api.texts().is_empty());
}

#[tokio::test]
async fn failed_delivery_abandons_the_schedule() {
    let fx = fixture().await;
    let item = fx.store.create(now_ts() - 5, "Never lands").await.unwrap();
    fx.registry.insert(item.schedule_id, CHAT);
    fx.api
        .fail_sends
        .store(true, std::sync::atomic::Ordering::SeqCst);

    fx.job.run().await.unwrap();
    fx.api
        .fail_sends
        .store(false, std::sync::atomic::Ordering::SeqCst);

    // Abandoned: the registry entry is gone, so later ticks skip the row.
    fx.job.run().await.unwrap();
    assert!(fx.api.texts().is_empty());
    assert_eq!(fx.store.list_due(now_ts()).await.unwrap().len(), 1);
}
