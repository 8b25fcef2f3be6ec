use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::{
    domain::{UserId, UserProfile},
    errors::Error,
    store::{
        BroadcastRecord, FeedbackCounts, FeedbackEntry, FloorChat, NewBroadcast, NewVideo,
        SectionCount, Store, User, Video,
    },
    Result,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        user_id BIGINT PRIMARY KEY,
        username TEXT,
        first_name TEXT,
        last_name TEXT,
        is_admin BOOLEAN NOT NULL DEFAULT FALSE,
        registration_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        last_activity TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        is_active BOOLEAN NOT NULL DEFAULT TRUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS section_stats (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL REFERENCES users (user_id),
        section_name TEXT NOT NULL,
        access_time TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS feedback (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL REFERENCES users (user_id),
        feedback_type TEXT NOT NULL,
        message TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        is_read BOOLEAN NOT NULL DEFAULT FALSE,
        admin_response TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS bot_settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS videos (
        id BIGSERIAL PRIMARY KEY,
        category TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        file_id TEXT NOT NULL,
        file_path TEXT,
        added_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        is_active BOOLEAN NOT NULL DEFAULT TRUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS floor_chats (
        floor_number BIGINT PRIMARY KEY,
        chat_link TEXT NOT NULL,
        chat_title TEXT,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS broadcasts (
        id BIGSERIAL PRIMARY KEY,
        admin_id BIGINT NOT NULL REFERENCES users (user_id),
        message TEXT NOT NULL,
        sent_count BIGINT NOT NULL DEFAULT 0,
        failed_count BIGINT NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        completed_at TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_users_last_activity ON users (last_activity)",
    "CREATE INDEX IF NOT EXISTS idx_section_stats_time ON section_stats (access_time)",
];

/// Client/server backend. Same tables and semantics as the SQLite one, with
/// native timestamp and boolean columns.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(url)
            .await?;
        tracing::info!("postgres pool connected");
        Ok(Self { pool })
    }
}

#[async_trait]
impl Store for PostgresStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn migrate(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    async fn user_exists(&self, id: UserId) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE user_id = $1)")
                .bind(id.0)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, username, first_name, last_name, is_admin,
                   registration_date, last_activity, is_active
            FROM users WHERE user_id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn upsert_user(&self, profile: &UserProfile, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users
                (user_id, username, first_name, last_name, registration_date, last_activity, is_active)
            VALUES ($1, $2, $3, $4, $5, $5, TRUE)
            ON CONFLICT (user_id) DO UPDATE SET
                username = EXCLUDED.username,
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                last_activity = EXCLUDED.last_activity,
                is_active = TRUE
            "#,
        )
        .bind(profile.id)
        .bind(profile.username.as_deref())
        .bind(profile.first_name.as_deref())
        .bind(profile.last_name.as_deref())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn touch_activity(&self, id: UserId, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE users SET last_activity = $1, is_active = TRUE WHERE user_id = $2")
            .bind(at)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn user_admin_flag(&self, id: UserId) -> Result<bool> {
        let flag: Option<bool> =
            sqlx::query_scalar("SELECT is_admin FROM users WHERE user_id = $1")
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await?;
        Ok(flag.unwrap_or(false))
    }

    async fn set_admin(&self, id: UserId, is_admin: bool) -> Result<()> {
        let res = sqlx::query("UPDATE users SET is_admin = $1 WHERE user_id = $2")
            .bind(is_admin)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn set_user_active(&self, id: UserId, is_active: bool) -> Result<()> {
        let res = sqlx::query("UPDATE users SET is_active = $1 WHERE user_id = $2")
            .bind(is_active)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn active_user_ids(&self) -> Result<Vec<UserId>> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT user_id FROM users WHERE is_active ORDER BY user_id")
                .fetch_all(&self.pool)
                .await?;
        Ok(ids.into_iter().map(UserId).collect())
    }

    async fn count_users(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn count_active_users(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_active")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn count_active_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<i64> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE last_activity >= $1 AND last_activity < $2",
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;
        Ok(n)
    }

    async fn count_active_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE last_activity >= $1")
            .bind(since)
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn log_section_access(
        &self,
        id: UserId,
        section: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO section_stats (user_id, section_name, access_time) VALUES ($1, $2, $3)",
        )
        .bind(id.0)
        .bind(section)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn popular_sections(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<SectionCount>> {
        let rows = sqlx::query_as::<_, SectionCount>(
            r#"
            SELECT section_name, COUNT(*) AS access_count
            FROM section_stats
            WHERE access_time >= $1
            GROUP BY section_name
            ORDER BY access_count DESC, section_name ASC
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn add_feedback(
        &self,
        id: UserId,
        feedback_type: &str,
        message: &str,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        let new_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO feedback (user_id, feedback_type, message, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(id.0)
        .bind(feedback_type)
        .bind(message)
        .bind(at)
        .fetch_one(&self.pool)
        .await?;
        Ok(new_id)
    }

    async fn feedback_counts(&self) -> Result<FeedbackCounts> {
        let (unread, total): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*) FILTER (WHERE NOT is_read), COUNT(*) FROM feedback",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(FeedbackCounts { unread, total })
    }

    async fn unread_feedback(&self, limit: i64) -> Result<Vec<FeedbackEntry>> {
        let rows = sqlx::query_as::<_, FeedbackEntry>(
            r#"
            SELECT f.id, f.user_id, f.feedback_type, f.message, f.created_at,
                   u.username, u.first_name, u.last_name
            FROM feedback f
            LEFT JOIN users u ON f.user_id = u.user_id
            WHERE NOT f.is_read
            ORDER BY f.created_at DESC, f.id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn mark_feedback_read(&self, feedback_id: i64) -> Result<()> {
        let res = sqlx::query("UPDATE feedback SET is_read = TRUE WHERE id = $1")
            .bind(feedback_id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::NotFound(format!("feedback {feedback_id}")));
        }
        Ok(())
    }

    async fn mark_all_feedback_read(&self) -> Result<u64> {
        let res = sqlx::query("UPDATE feedback SET is_read = TRUE WHERE NOT is_read")
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    async fn set_feedback_response(&self, feedback_id: i64, response: &str) -> Result<()> {
        let res =
            sqlx::query("UPDATE feedback SET admin_response = $1, is_read = TRUE WHERE id = $2")
                .bind(response)
                .bind(feedback_id)
                .execute(&self.pool)
                .await?;
        if res.rows_affected() == 0 {
            return Err(Error::NotFound(format!("feedback {feedback_id}")));
        }
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM bot_settings WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    async fn set_setting(&self, key: &str, value: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO bot_settings (key, value, updated_at) VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add_video(&self, video: &NewVideo, at: DateTime<Utc>) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO videos (category, title, description, file_id, file_path, added_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&video.category)
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.file_id)
        .bind(video.file_path.as_deref())
        .bind(at)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn videos_by_category(&self, category: &str) -> Result<Vec<Video>> {
        let rows = sqlx::query_as::<_, Video>(
            r#"
            SELECT id, title, description, file_id, file_path
            FROM videos
            WHERE category = $1 AND is_active
            ORDER BY added_at DESC, id DESC
            "#,
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn set_floor_chat(
        &self,
        floor: i64,
        link: &str,
        title: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO floor_chats (floor_number, chat_link, chat_title, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (floor_number) DO UPDATE SET
                chat_link = EXCLUDED.chat_link,
                chat_title = EXCLUDED.chat_title,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(floor)
        .bind(link)
        .bind(title)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_floor_chat(&self, floor: i64) -> Result<Option<FloorChat>> {
        let row = sqlx::query_as::<_, FloorChat>(
            "SELECT floor_number, chat_link, chat_title FROM floor_chats WHERE floor_number = $1",
        )
        .bind(floor)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn floor_chats(&self) -> Result<Vec<FloorChat>> {
        let rows = sqlx::query_as::<_, FloorChat>(
            "SELECT floor_number, chat_link, chat_title FROM floor_chats ORDER BY floor_number",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn record_broadcast(&self, record: &NewBroadcast) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO broadcasts
                (admin_id, message, sent_count, failed_count, created_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(record.admin_id.0)
        .bind(&record.message)
        .bind(record.sent_count)
        .bind(record.failed_count)
        .bind(record.created_at)
        .bind(record.completed_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn recent_broadcasts(&self, limit: i64) -> Result<Vec<BroadcastRecord>> {
        let rows = sqlx::query_as::<_, BroadcastRecord>(
            r#"
            SELECT id, admin_id, message, sent_count, failed_count, created_at, completed_at
            FROM broadcasts
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
