use std::{path::Path, str::FromStr};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

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
        user_id INTEGER PRIMARY KEY,
        username TEXT,
        first_name TEXT,
        last_name TEXT,
        is_admin BOOLEAN NOT NULL DEFAULT FALSE,
        registration_date DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        last_activity DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        is_active BOOLEAN NOT NULL DEFAULT TRUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS section_stats (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        section_name TEXT NOT NULL,
        access_time DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (user_id) REFERENCES users (user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS feedback (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        feedback_type TEXT NOT NULL,
        message TEXT NOT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        is_read BOOLEAN NOT NULL DEFAULT FALSE,
        admin_response TEXT,
        FOREIGN KEY (user_id) REFERENCES users (user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS bot_settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS videos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        category TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        file_id TEXT NOT NULL,
        file_path TEXT,
        added_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        is_active BOOLEAN NOT NULL DEFAULT TRUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS floor_chats (
        floor_number INTEGER PRIMARY KEY,
        chat_link TEXT NOT NULL,
        chat_title TEXT,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS broadcasts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        admin_id INTEGER NOT NULL,
        message TEXT NOT NULL,
        sent_count INTEGER NOT NULL DEFAULT 0,
        failed_count INTEGER NOT NULL DEFAULT 0,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        completed_at DATETIME,
        FOREIGN KEY (admin_id) REFERENCES users (user_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_users_last_activity ON users (last_activity)",
    "CREATE INDEX IF NOT EXISTS idx_section_stats_time ON section_stats (access_time)",
];

/// Embedded single-file backend.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open(path: &Path, max_connections: u32) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(opts)
            .await?;

        tracing::info!(path = %path.display(), "sqlite database opened");
        Ok(Self { pool })
    }

    /// Private in-memory database (one connection, so every query sees the same data).
    pub async fn in_memory() -> Result<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
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
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE user_id = ?)")
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
            FROM users WHERE user_id = ?
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
            VALUES (?, ?, ?, ?, ?, ?, TRUE)
            ON CONFLICT (user_id) DO UPDATE SET
                username = excluded.username,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                last_activity = excluded.last_activity,
                is_active = TRUE
            "#,
        )
        .bind(profile.id)
        .bind(profile.username.as_deref())
        .bind(profile.first_name.as_deref())
        .bind(profile.last_name.as_deref())
        .bind(at)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn touch_activity(&self, id: UserId, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE users SET last_activity = ?, is_active = TRUE WHERE user_id = ?")
            .bind(at)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn user_admin_flag(&self, id: UserId) -> Result<bool> {
        let flag: Option<bool> = sqlx::query_scalar("SELECT is_admin FROM users WHERE user_id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(flag.unwrap_or(false))
    }

    async fn set_admin(&self, id: UserId, is_admin: bool) -> Result<()> {
        let res = sqlx::query("UPDATE users SET is_admin = ? WHERE user_id = ?")
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
        let res = sqlx::query("UPDATE users SET is_active = ? WHERE user_id = ?")
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
            sqlx::query_scalar("SELECT user_id FROM users WHERE is_active = TRUE ORDER BY user_id")
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
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_active = TRUE")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn count_active_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<i64> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE last_activity >= ? AND last_activity < ?",
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;
        Ok(n)
    }

    async fn count_active_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE last_activity >= ?")
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
        sqlx::query("INSERT INTO section_stats (user_id, section_name, access_time) VALUES (?, ?, ?)")
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
            WHERE access_time >= ?
            GROUP BY section_name
            ORDER BY access_count DESC, section_name ASC
            LIMIT ?
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
        let res = sqlx::query(
            "INSERT INTO feedback (user_id, feedback_type, message, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id.0)
        .bind(feedback_type)
        .bind(message)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    async fn feedback_counts(&self) -> Result<FeedbackCounts> {
        let (unread, total): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(CASE WHEN is_read = FALSE THEN 1 ELSE 0 END), 0), COUNT(*)
            FROM feedback
            "#,
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
            WHERE f.is_read = FALSE
            ORDER BY f.created_at DESC, f.id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn mark_feedback_read(&self, feedback_id: i64) -> Result<()> {
        let res = sqlx::query("UPDATE feedback SET is_read = TRUE WHERE id = ?")
            .bind(feedback_id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::NotFound(format!("feedback {feedback_id}")));
        }
        Ok(())
    }

    async fn mark_all_feedback_read(&self) -> Result<u64> {
        let res = sqlx::query("UPDATE feedback SET is_read = TRUE WHERE is_read = FALSE")
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    async fn set_feedback_response(&self, feedback_id: i64, response: &str) -> Result<()> {
        let res = sqlx::query("UPDATE feedback SET admin_response = ?, is_read = TRUE WHERE id = ?")
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
            sqlx::query_scalar("SELECT value FROM bot_settings WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    async fn set_setting(&self, key: &str, value: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO bot_settings (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
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
        let res = sqlx::query(
            r#"
            INSERT INTO videos (category, title, description, file_id, file_path, added_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&video.category)
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.file_id)
        .bind(video.file_path.as_deref())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    async fn videos_by_category(&self, category: &str) -> Result<Vec<Video>> {
        let rows = sqlx::query_as::<_, Video>(
            r#"
            SELECT id, title, description, file_id, file_path
            FROM videos
            WHERE category = ? AND is_active = TRUE
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
            VALUES (?, ?, ?, ?)
            ON CONFLICT (floor_number) DO UPDATE SET
                chat_link = excluded.chat_link,
                chat_title = excluded.chat_title,
                updated_at = excluded.updated_at
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
            "SELECT floor_number, chat_link, chat_title FROM floor_chats WHERE floor_number = ?",
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
        let res = sqlx::query(
            r#"
            INSERT INTO broadcasts
                (admin_id, message, sent_count, failed_count, created_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.admin_id.0)
        .bind(&record.message)
        .bind(record.sent_count)
        .bind(record.failed_count)
        .bind(record.created_at)
        .bind(record.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    async fn recent_broadcasts(&self, limit: i64) -> Result<Vec<BroadcastRecord>> {
        let rows = sqlx::query_as::<_, BroadcastRecord>(
            r#"
            SELECT id, admin_id, message, sent_count, failed_count, created_at, completed_at
            FROM broadcasts
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn profile(id: i64, username: &str) -> UserProfile {
        UserProfile {
            id,
            username: Some(username.to_string()),
            first_name: Some(format!("First{id}")),
            last_name: None,
        }
    }

    #[tokio::test]
    async fn upsert_then_exists_and_overwrites_identity() {
        let store = SqliteStore::in_memory().await.unwrap();
        let t0 = Utc::now() - Duration::minutes(10);
        let t1 = t0 + Duration::minutes(5);

        assert!(!store.user_exists(UserId(1)).await.unwrap());
        store.upsert_user(&profile(1, "old"), t0).await.unwrap();
        assert!(store.user_exists(UserId(1)).await.unwrap());

        store.set_admin(UserId(1), true).await.unwrap();
        store.upsert_user(&profile(1, "new"), t1).await.unwrap();

        let user = store.get_user(UserId(1)).await.unwrap().unwrap();
        assert_eq!(user.username.as_deref(), Some("new"));
        assert!(user.is_admin, "upsert must not reset the admin flag");
        assert_eq!(user.registration_date, t0);
        assert_eq!(user.last_activity, t1);
        assert_eq!(store.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn targeted_updates_report_missing_rows() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(matches!(
            store.set_admin(UserId(404), true).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store.mark_feedback_read(12).await,
            Err(Error::NotFound(_))
        ));
        assert!(!store.user_admin_flag(UserId(404)).await.unwrap());
        assert!(store.get_user(UserId(404)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let store = SqliteStore::in_memory().await.unwrap();
        let res = store
            .add_feedback(UserId(77), "general", "orphan", Utc::now())
            .await;
        assert!(matches!(res, Err(Error::Storage(_))));
    }

    #[tokio::test]
    async fn active_users_and_deactivation() {
        let store = SqliteStore::in_memory().await.unwrap();
        let now = Utc::now();
        for id in [3, 1, 2] {
            store.upsert_user(&profile(id, "u"), now).await.unwrap();
        }
        store.set_user_active(UserId(2), false).await.unwrap();

        assert_eq!(
            store.active_user_ids().await.unwrap(),
            vec![UserId(1), UserId(3)]
        );
        assert_eq!(store.count_active_users().await.unwrap(), 2);
        assert_eq!(store.count_users().await.unwrap(), 3);

        // Coming back reactivates.
        store.upsert_user(&profile(2, "u"), now).await.unwrap();
        assert_eq!(store.count_active_users().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn any_activity_reactivates() {
        let store = SqliteStore::in_memory().await.unwrap();
        let now = Utc::now();
        store.upsert_user(&profile(5, "u"), now).await.unwrap();
        store.set_user_active(UserId(5), false).await.unwrap();
        assert!(store.active_user_ids().await.unwrap().is_empty());

        store.touch_activity(UserId(5), now).await.unwrap();
        assert_eq!(store.active_user_ids().await.unwrap(), vec![UserId(5)]);
    }

    #[tokio::test]
    async fn activity_window_counts() {
        let store = SqliteStore::in_memory().await.unwrap();
        let now = Utc::now();
        store.upsert_user(&profile(1, "a"), now).await.unwrap();
        store
            .upsert_user(&profile(2, "b"), now - Duration::days(3))
            .await
            .unwrap();
        store
            .upsert_user(&profile(3, "c"), now - Duration::days(20))
            .await
            .unwrap();
        store
            .upsert_user(&profile(4, "d"), now - Duration::days(45))
            .await
            .unwrap();

        assert_eq!(
            store
                .count_active_since(now - Duration::days(7))
                .await
                .unwrap(),
            2
        );
        assert_eq!(
            store
                .count_active_since(now - Duration::days(30))
                .await
                .unwrap(),
            3
        );
        assert_eq!(
            store
                .count_active_between(now - Duration::days(4), now - Duration::days(2))
                .await
                .unwrap(),
            1
        );

        store.touch_activity(UserId(4), now).await.unwrap();
        assert_eq!(
            store
                .count_active_since(now - Duration::days(7))
                .await
                .unwrap(),
            3
        );
    }

    #[tokio::test]
    async fn popular_sections_rank_and_window() {
        let store = SqliteStore::in_memory().await.unwrap();
        let now = Utc::now();
        for id in 1..=3 {
            store.upsert_user(&profile(id, "u"), now).await.unwrap();
        }
        store.log_section_access(UserId(1), "a", now).await.unwrap();
        store.log_section_access(UserId(2), "a", now).await.unwrap();
        store.log_section_access(UserId(3), "b", now).await.unwrap();
        // Outside the 30 day window.
        for _ in 0..5 {
            store
                .log_section_access(UserId(3), "old", now - Duration::days(31))
                .await
                .unwrap();
        }

        let since = now - Duration::days(30);
        let top = store.popular_sections(since, 3).await.unwrap();
        let top: Vec<(String, i64)> = top
            .into_iter()
            .map(|s| (s.section_name, s.access_count))
            .collect();
        assert_eq!(top, vec![("a".to_string(), 2), ("b".to_string(), 1)]);

        // Ties broken by name.
        store.log_section_access(UserId(1), "b", now).await.unwrap();
        store.log_section_access(UserId(1), "0", now).await.unwrap();
        store.log_section_access(UserId(2), "0", now).await.unwrap();
        let top = store.popular_sections(since, 2).await.unwrap();
        assert_eq!(top[0].section_name, "0");
        assert_eq!(top[1].section_name, "a");
    }

    #[tokio::test]
    async fn set_setting_is_idempotent() {
        let store = SqliteStore::in_memory().await.unwrap();
        let now = Utc::now();
        assert_eq!(store.get_setting("k").await.unwrap(), None);

        store.set_setting("k", "v", now).await.unwrap();
        store.set_setting("k", "v", now).await.unwrap();

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bot_settings WHERE key = 'k'")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(store.get_setting("k").await.unwrap().as_deref(), Some("v"));

        store.set_setting("k", "w", now).await.unwrap();
        assert_eq!(store.get_setting("k").await.unwrap().as_deref(), Some("w"));
    }

    #[tokio::test]
    async fn feedback_lifecycle() {
        let store = SqliteStore::in_memory().await.unwrap();
        let now = Utc::now();
        store.upsert_user(&profile(5, "five"), now).await.unwrap();

        let first = store
            .add_feedback(UserId(5), "bug", "broken", now - Duration::minutes(1))
            .await
            .unwrap();
        let second = store
            .add_feedback(UserId(5), "general", "hello", now)
            .await
            .unwrap();
        assert!(first > 0 && second > first);

        assert_eq!(
            store.feedback_counts().await.unwrap(),
            FeedbackCounts {
                unread: 2,
                total: 2
            }
        );

        let unread = store.unread_feedback(10).await.unwrap();
        assert_eq!(unread.len(), 2);
        assert_eq!(unread[0].id, second);
        assert_eq!(unread[0].username.as_deref(), Some("five"));

        store.mark_feedback_read(first).await.unwrap();
        store.set_feedback_response(second, "thanks").await.unwrap();
        assert_eq!(
            store.feedback_counts().await.unwrap(),
            FeedbackCounts {
                unread: 0,
                total: 2
            }
        );

        store
            .add_feedback(UserId(5), "question", "why?", now)
            .await
            .unwrap();
        assert_eq!(store.mark_all_feedback_read().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_feedback_table_counts_zero() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert_eq!(
            store.feedback_counts().await.unwrap(),
            FeedbackCounts::default()
        );
        assert!(store.unread_feedback(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn videos_and_floor_chats() {
        let store = SqliteStore::in_memory().await.unwrap();
        let now = Utc::now();
        let video = |title: &str| NewVideo {
            category: "laundry".to_string(),
            title: title.to_string(),
            description: "how to".to_string(),
            file_id: format!("file-{title}"),
            file_path: None,
        };
        store
            .add_video(&video("older"), now - Duration::hours(1))
            .await
            .unwrap();
        store.add_video(&video("newer"), now).await.unwrap();

        let videos = store.videos_by_category("laundry").await.unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].title, "newer");
        assert!(store.videos_by_category("kitchen").await.unwrap().is_empty());

        store
            .set_floor_chat(3, "https://t.me/a", Some("Floor 3"), now)
            .await
            .unwrap();
        store
            .set_floor_chat(3, "https://t.me/b", None, now)
            .await
            .unwrap();
        store
            .set_floor_chat(1, "https://t.me/c", None, now)
            .await
            .unwrap();

        let chat = store.get_floor_chat(3).await.unwrap().unwrap();
        assert_eq!(chat.chat_link, "https://t.me/b");
        assert_eq!(chat.chat_title, None);
        assert!(store.get_floor_chat(9).await.unwrap().is_none());
        let all = store.floor_chats().await.unwrap();
        assert_eq!(
            all.iter().map(|c| c.floor_number).collect::<Vec<_>>(),
            vec![1, 3]
        );
    }

    #[tokio::test]
    async fn broadcasts_are_recorded() {
        let store = SqliteStore::in_memory().await.unwrap();
        let now = Utc::now();
        store.upsert_user(&profile(900, "admin"), now).await.unwrap();

        let id = store
            .record_broadcast(&NewBroadcast {
                admin_id: UserId(900),
                message: "water off at 10".to_string(),
                sent_count: 2,
                failed_count: 1,
                created_at: now,
                completed_at: Some(now),
            })
            .await
            .unwrap();
        assert!(id > 0);

        let recent = store.recent_broadcasts(5).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].sent_count, 2);
        assert_eq!(recent[0].failed_count, 1);
        assert_eq!(recent[0].completed_at, Some(now));
    }
}
