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
use schema::{completions, deadlines};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
type SqlitePool = Pool<SqliteAsyncConn>;
type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

#[derive(Debug, Clone, Serialize)]
pub struct DeadlineItem {
    pub deadline_id: i32,
    pub title: String,
    pub chat_id: i64,
    pub message_id: i64,
    pub file_id: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeadlineStatus {
    pub deadline: DeadlineItem,
    pub completed: i64,
}

#[derive(Queryable)]
struct DeadlineRow {
    deadline_id: i32,
    title: String,
    chat_id: i64,
    message_id: i64,
    file_id: String,
    created_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = deadlines)]
struct NewDeadline<'a> {
    title: &'a str,
    chat_id: i64,
    message_id: i64,
    file_id: &'a str,
    created_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = completions)]
struct NewCompletion {
    deadline_id: i32,
    user_id: i64,
    completed_at: i64,
}

pub struct DeadlineStore {
    pool: SqlitePool,
}

impl DeadlineStore {
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

    /// Message id stays 0 until the posted artifact lands and is patched in.
    pub async fn create(&self, title: &str, chat_id: i64, file_id: &str) -> Result<DeadlineItem> {
        let new = NewDeadline {
            title,
            chat_id,
            message_id: 0,
            file_id,
            created_at: now_ts(),
        };

        let mut conn = self.conn().await?;
        diesel::insert_into(deadlines::table)
            .values(&new)
            .execute(&mut conn)
            .await
            .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))?;

        let row: DeadlineRow = deadlines::table
            .order(deadlines::deadline_id.desc())
            .first(&mut conn)
            .await
            .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))?;
        Ok(map_row(row))
    }

    pub async fn set_message_id(&self, deadline_id: i32, message_id: i64) -> Result<()> {
        let mut conn = self.conn().await?;
        diesel::update(deadlines::table.filter(deadlines::deadline_id.eq(deadline_id)))
            .set(deadlines::message_id.eq(message_id))
            .execute(&mut conn)
            .await
            .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))?;
        Ok(())
    }

    pub async fn get(&self, deadline_id: i32) -> Result<Option<DeadlineItem>> {
        let mut conn = self.conn().await?;
        let row: Option<DeadlineRow> = deadlines::table
            .filter(deadlines::deadline_id.eq(deadline_id))
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))?;
        Ok(row.map(map_row))
    }

    pub async fn latest(&self) -> Result<Option<DeadlineItem>> {
        let mut conn = self.conn().await?;
        let row: Option<DeadlineRow> = deadlines::table
            .order((deadlines::created_at.desc(), deadlines::deadline_id.desc()))
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))?;
        Ok(row.map(map_row))
    }

    pub async fn count(&self) -> Result<i64> {
        let mut conn = self.conn().await?;
        deadlines::table
            .count()
            .get_result(&mut conn)
            .await
            .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))
    }

    /// All deadlines with their completion counts, most recently created first.
    pub async fn list_with_counts(&self) -> Result<Vec<DeadlineStatus>> {
        let mut conn = self.conn().await?;
        let rows: Vec<DeadlineRow> = deadlines::table
            .order((deadlines::created_at.desc(), deadlines::deadline_id.desc()))
            .load(&mut conn)
            .await
            .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let completed: i64 = completions::table
                .filter(completions::deadline_id.eq(row.deadline_id))
                .count()
                .get_result(&mut conn)
                .await
                .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))?;
            out.push(DeadlineStatus {
                deadline: map_row(row),
                completed,
            });
        }
        Ok(out)
    }

    /// Returns false when the (deadline, user) pair was already recorded.
    /// The composite primary key makes a concurrent duplicate read the same way.
    pub async fn record_completion(&self, deadline_id: i32, user_id: i64) -> Result<bool> {
        let new = NewCompletion {
            deadline_id,
            user_id,
            completed_at: now_ts(),
        };

        let mut conn = self.conn().await?;
        let inserted = diesel::insert_or_ignore_into(completions::table)
            .values(&new)
            .execute(&mut conn)
            .await
            .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))?;
        Ok(inserted > 0)
    }

    pub async fn completion_count(&self, deadline_id: i32) -> Result<i64> {
        let mut conn = self.conn().await?;
        completions::table
            .filter(completions::deadline_id.eq(deadline_id))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))
    }

    pub async fn completed_user_ids(&self, deadline_id: i32) -> Result<Vec<i64>> {
        let mut conn = self.conn().await?;
        completions::table
            .filter(completions::deadline_id.eq(deadline_id))
            .select(completions::user_id)
            .load(&mut conn)
            .await
            .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        self.pool
            .get()
            .await
            .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))
    }
}

fn map_row(row: DeadlineRow) -> DeadlineItem {
    DeadlineItem {
        deadline_id: row.deadline_id,
        title: row.title,
        chat_id: row.chat_id,
        message_id: row.message_id,
        file_id: row.file_id,
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
