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
use schema::members;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
type SqlitePool = Pool<SqliteAsyncConn>;
type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

#[derive(Debug, Clone, Serialize)]
pub struct Member {
    pub user_id: i64,
    pub first_name: String,
    pub registered_at: i64,
}

#[derive(Queryable)]
struct MemberRow {
    user_id: i64,
    first_name: String,
    registered_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = members)]
struct NewMember<'a> {
    user_id: i64,
    first_name: &'a str,
    registered_at: i64,
}

pub struct MemberStore {
    pool: SqlitePool,
}

impl MemberStore {
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

    /// Insert the member on first sighting, refresh the name on later ones.
    pub async fn upsert(&self, user_id: i64, first_name: &str) -> Result<()> {
        let new = NewMember {
            user_id,
            first_name,
            registered_at: now_ts(),
        };

        let mut conn = self.conn().await?;
        diesel::insert_or_ignore_into(members::table)
            .values(&new)
            .execute(&mut conn)
            .await
            .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))?;

        diesel::update(members::table.filter(members::user_id.eq(user_id)))
            .set(members::first_name.eq(first_name))
            .execute(&mut conn)
            .await
            .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Member>> {
        let mut conn = self.conn().await?;
        let rows: Vec<MemberRow> = members::table
            .order(members::user_id.asc())
            .load(&mut conn)
            .await
            .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))?;
        Ok(rows.into_iter().map(map_row).collect())
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        self.pool
            .get()
            .await
            .map_err(|e| StudyGroupBotError::Runtime(e.to_string()))
    }
}

fn map_row(row: MemberRow) -> Member {
    Member {
        user_id: row.user_id,
        first_name: row.first_name,
        registered_at: row.registered_at,
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
