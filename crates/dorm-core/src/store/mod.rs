//! Persistent store: the storage trait, its row types, and the two backends.
//!
//! Core components only see `Arc<dyn Store>`; which engine sits behind it is
//! decided once in [`open`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    config::StorageConfig,
    domain::{UserId, UserProfile},
    Result,
};

pub mod postgres;
pub mod sqlite;

pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;

#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_admin: bool,
    pub registration_date: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct SectionCount {
    pub section_name: String,
    pub access_count: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeedbackCounts {
    pub unread: i64,
    pub total: i64,
}

/// Feedback row joined with whatever identity the sender's user row carries.
#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct FeedbackEntry {
    pub id: i64,
    pub user_id: i64,
    pub feedback_type: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewVideo {
    pub category: String,
    pub title: String,
    pub description: String,
    pub file_id: String,
    pub file_path: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct Video {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub file_id: String,
    pub file_path: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct FloorChat {
    pub floor_number: i64,
    pub chat_link: String,
    pub chat_title: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewBroadcast {
    pub admin_id: UserId,
    pub message: String,
    pub sent_count: i64,
    pub failed_count: i64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct BroadcastRecord {
    pub id: i64,
    pub admin_id: i64,
    pub message: String,
    pub sent_count: i64,
    pub failed_count: i64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Durable CRUD over users, section events, feedback, settings, videos,
/// floor chats and broadcasts.
///
/// Each call is one statement or one transaction. Reads that find nothing
/// return `Ok` with an empty value; `Err` always means the backend failed
/// (or, for targeted updates, that the row does not exist).
#[async_trait]
pub trait Store: Send + Sync {
    /// Name of the engine, for logs.
    fn backend(&self) -> &'static str;

    /// Create every table that does not exist yet.
    async fn migrate(&self) -> Result<()>;

    /// Close the pool; later queries fail with a storage error.
    async fn close(&self);

    // ---- users
    async fn user_exists(&self, id: UserId) -> Result<bool>;
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;
    /// Insert, or overwrite identity fields and `last_activity` of an existing
    /// row. `is_admin` and `registration_date` survive; the row is reactivated.
    async fn upsert_user(&self, profile: &UserProfile, at: DateTime<Utc>) -> Result<()>;
    /// Bump `last_activity` and reactivate: an inbound update proves the chat
    /// is reachable again.
    async fn touch_activity(&self, id: UserId, at: DateTime<Utc>) -> Result<()>;
    /// Stored flag only; `Ok(false)` for unknown users.
    async fn user_admin_flag(&self, id: UserId) -> Result<bool>;
    async fn set_admin(&self, id: UserId, is_admin: bool) -> Result<()>;
    async fn set_user_active(&self, id: UserId, is_active: bool) -> Result<()>;
    async fn active_user_ids(&self) -> Result<Vec<UserId>>;
    async fn count_users(&self) -> Result<i64>;
    async fn count_active_users(&self) -> Result<i64>;
    /// Users whose `last_activity` falls in `[from, to)`.
    async fn count_active_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<i64>;
    /// Users whose `last_activity >= since`.
    async fn count_active_since(&self, since: DateTime<Utc>) -> Result<i64>;

    // ---- section stats
    async fn log_section_access(&self, id: UserId, section: &str, at: DateTime<Utc>)
        -> Result<()>;
    /// Counts per section since `since`, by count desc then name asc.
    async fn popular_sections(&self, since: DateTime<Utc>, limit: i64)
        -> Result<Vec<SectionCount>>;

    // ---- feedback
    /// Returns the new row id (always non-zero on success).
    async fn add_feedback(
        &self,
        id: UserId,
        feedback_type: &str,
        message: &str,
        at: DateTime<Utc>,
    ) -> Result<i64>;
    async fn feedback_counts(&self) -> Result<FeedbackCounts>;
    /// Unread items, newest first.
    async fn unread_feedback(&self, limit: i64) -> Result<Vec<FeedbackEntry>>;
    async fn mark_feedback_read(&self, feedback_id: i64) -> Result<()>;
    /// Returns how many rows flipped.
    async fn mark_all_feedback_read(&self) -> Result<u64>;
    async fn set_feedback_response(&self, feedback_id: i64, response: &str) -> Result<()>;

    // ---- settings
    async fn get_setting(&self, key: &str) -> Result<Option<String>>;
    async fn set_setting(&self, key: &str, value: &str, at: DateTime<Utc>) -> Result<()>;

    // ---- videos
    async fn add_video(&self, video: &NewVideo, at: DateTime<Utc>) -> Result<i64>;
    /// Active videos of a category, newest first.
    async fn videos_by_category(&self, category: &str) -> Result<Vec<Video>>;

    // ---- floor chats
    async fn set_floor_chat(
        &self,
        floor: i64,
        link: &str,
        title: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<()>;
    async fn get_floor_chat(&self, floor: i64) -> Result<Option<FloorChat>>;
    async fn floor_chats(&self) -> Result<Vec<FloorChat>>;

    // ---- broadcasts
    async fn record_broadcast(&self, record: &NewBroadcast) -> Result<i64>;
    async fn recent_broadcasts(&self, limit: i64) -> Result<Vec<BroadcastRecord>>;
}

/// Open and migrate the backend selected by configuration.
pub async fn open(cfg: &StorageConfig, max_connections: u32) -> Result<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match cfg {
        StorageConfig::Sqlite { path } => Arc::new(SqliteStore::open(path, max_connections).await?),
        StorageConfig::Postgres { url } => {
            Arc::new(PostgresStore::connect(url, max_connections).await?)
        }
    };
    store.migrate().await?;
    tracing::info!(backend = store.backend(), "store ready");
    Ok(store)
}
