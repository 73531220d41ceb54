use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::RunQueryDsl;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use serde::Serialize;

use crate::error::{Result, StudyGroupBotError};

mod schema;
use schema::schedules;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
type SqlitePool = Pool<SqliteAsyncConn>;
type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

#[derive(Debug, Clone, Serialize)]
pub struct ScheduledMessage {
    pub schedule_id: i32,
    pub run_time: i64,
    pub message: String,
    pub created_at: i64,
}

#[derive(Queryable)]
struct ScheduleRow {
    schedule_id: i32,
    run_time: i64,
    message: String,
    created_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = schedules)]
struct NewSchedule<'a> {
    run_time: i64,
    message: &'a str,
    created_at: i64,
}

pub struct ScheduleStore {
    pool: SqlitePool,
}

impl ScheduleStore {
    pub async fn new(sqlite_path: impl AsRef<str>) -> Result<Self> {
        let sqlite_path = sqlite_path.as_ref();
        ensure_parent_dir(sqlite_path)?;
        run_migrations(sqlite_path).await?;

        let manager = AsyncDieselConnectionManager::<SqliteAsyncConn>::new(sqlite_path);
        let pool: SqlitePool = Pool::builder()
            .build(manager)
            .await
            .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))?;
        Ok(Self { pool })
    }

    pub async fn create(&self, run_time: i64, message: &str) -> Result<ScheduledMessage> {
        let new = NewSchedule {
            run_time,
            message,
            created_at: now_ts(),
        };

        let mut conn = self.conn().await?;
        diesel::insert_into(schedules::table)
            .values(&new)
            .execute(&mut conn)
            .await
            .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))?;

        let row: ScheduleRow = schedules::table
            .order(schedules::schedule_id.desc())
            .first(&mut conn)
            .await
            .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))?;
        Ok(map_row(row))
    }

    pub async fn list_due(&self, now: i64) -> Result<Vec<ScheduledMessage>> {
        let mut conn = self.conn().await?;
        let rows: Vec<ScheduleRow> = schedules::table
            .filter(schedules::run_time.le(now))
            .order(schedules::run_time.asc())
            .load(&mut conn)
            .await
            .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))?;
        Ok(rows.into_iter().map(map_row).collect())
    }

    pub async fn list_pending(&self, now: i64) -> Result<Vec<ScheduledMessage>> {
        let mut conn = self.conn().await?;
        let rows: Vec<ScheduleRow> = schedules::table
            .filter(schedules::run_time.gt(now))
            .order(schedules::run_time.asc())
            .load(&mut conn)
            .await
            .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))?;
        Ok(rows.into_iter().map(map_row).collect())
    }

    /// Deleting the row is the commit signal for "delivered".
    pub async fn delete(&self, schedule_id: i32) -> Result<bool> {
        let mut conn = self.conn().await?;
        let deleted =
            diesel::delete(schedules::table.filter(schedules::schedule_id.eq(schedule_id)))
                .execute(&mut conn)
                .await
                .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))?;
        Ok(deleted > 0)
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        self.pool
            .get()
            .await
            .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))
    }
}

fn map_row(row: ScheduleRow) -> ScheduledMessage {
    ScheduledMessage {
        schedule_id: row.schedule_id,
        run_time: row.run_time,
        message: row.message,
        created_at: row.created_at,
    }
}

fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

fn ensure_parent_dir(path: &str) -> Result<()> {
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StudyGroupBotError::Runtime(e.to_string()))?;
    }
    Ok(())
}

async fn run_migrations(database_url: &str) -> Result<()> {
    let database_url = database_url.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = SqliteConnection::establish(&database_url)
            .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))?;
        Ok::<_, StudyGroupBotError>(())
    })
    .await
    .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))??;
    Ok(())
}
