pub mod comments;
pub mod features;
pub mod pairs;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::{debug, info};
use tubegraph_core::{Channel, CoreError, DatabaseError, Search, Video};
use youtube_client::{ChannelRecord, VideoRecord};

/// Statements are idempotent so migration can run at every startup.
const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS channels (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        channel_id TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        created_at TEXT,
        view_count INTEGER NOT NULL DEFAULT 0,
        subscriber_count INTEGER NOT NULL DEFAULT 0,
        video_count INTEGER NOT NULL DEFAULT 0,
        comments_count INTEGER NOT NULL DEFAULT 0,
        lease_owner TEXT,
        lease_expires_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS videos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        video_id TEXT NOT NULL UNIQUE,
        kind TEXT NOT NULL DEFAULT '',
        published_at TEXT NOT NULL,
        channel_id TEXT NOT NULL,
        title TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        thumbnail TEXT NOT NULL DEFAULT '',
        tags TEXT,
        category_id INTEGER NOT NULL DEFAULT 0,
        default_language TEXT,
        duration_secs INTEGER NOT NULL DEFAULT 0,
        definition TEXT NOT NULL DEFAULT '',
        view_count INTEGER NOT NULL DEFAULT 0,
        like_count INTEGER NOT NULL DEFAULT 0,
        dislike_count INTEGER NOT NULL DEFAULT 0,
        favorite_count INTEGER NOT NULL DEFAULT 0,
        comment_count INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS idx_videos_channel ON videos (channel_id)",
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        user_name TEXT NOT NULL DEFAULT '',
        videos_commented INTEGER NOT NULL DEFAULT 0,
        like_count INTEGER NOT NULL DEFAULT 0,
        channel_id TEXT NOT NULL,
        UNIQUE (user_id, channel_id)
    )",
    "CREATE TABLE IF NOT EXISTS comments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        comment_id TEXT NOT NULL UNIQUE,
        author_id INTEGER NOT NULL REFERENCES users (id),
        kind TEXT NOT NULL DEFAULT '',
        like_count INTEGER NOT NULL DEFAULT 0,
        parent_id INTEGER REFERENCES comments (id),
        published_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        text_display TEXT NOT NULL DEFAULT '',
        text_original TEXT NOT NULL DEFAULT '',
        video_id TEXT NOT NULL,
        channel_id TEXT NOT NULL,
        reply_count INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS idx_comments_video ON comments (video_id)",
    "CREATE INDEX IF NOT EXISTS idx_comments_channel ON comments (channel_id)",
    "CREATE INDEX IF NOT EXISTS idx_comments_author ON comments (author_id)",
    "CREATE TABLE IF NOT EXISTS user_features (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_at TEXT NOT NULL,
        channel_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        page_rank REAL NOT NULL DEFAULT 0,
        weighted_degree REAL NOT NULL DEFAULT 0,
        betweenness REAL,
        videos_commented INTEGER NOT NULL DEFAULT 0,
        like_count INTEGER NOT NULL DEFAULT 0,
        subscriber_count INTEGER NOT NULL DEFAULT 0,
        view_count INTEGER NOT NULL DEFAULT 0,
        video_count INTEGER NOT NULL DEFAULT 0,
        description TEXT NOT NULL DEFAULT ''
    )",
    "CREATE INDEX IF NOT EXISTS idx_user_features_run ON user_features (channel_id, run_at)",
    "CREATE TABLE IF NOT EXISTS video_features (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_at TEXT NOT NULL,
        channel_id TEXT NOT NULL,
        video_id TEXT NOT NULL,
        page_rank REAL NOT NULL DEFAULT 0,
        weighted_degree REAL NOT NULL DEFAULT 0,
        betweenness REAL,
        view_count INTEGER NOT NULL DEFAULT 0,
        like_count INTEGER NOT NULL DEFAULT 0,
        dislike_count INTEGER NOT NULL DEFAULT 0,
        favorite_count INTEGER NOT NULL DEFAULT 0,
        comment_count INTEGER NOT NULL DEFAULT 0,
        users_power INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS idx_video_features_run ON video_features (channel_id, run_at)",
    "CREATE TABLE IF NOT EXISTS channel_features (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_at TEXT NOT NULL,
        channel_id TEXT NOT NULL,
        view_count INTEGER NOT NULL DEFAULT 0,
        subscriber_count INTEGER NOT NULL DEFAULT 0,
        video_count INTEGER NOT NULL DEFAULT 0,
        comments_count INTEGER NOT NULL DEFAULT 0,
        user_node_count INTEGER NOT NULL DEFAULT 0,
        user_edge_count INTEGER NOT NULL DEFAULT 0,
        video_node_count INTEGER NOT NULL DEFAULT 0,
        video_edge_count INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS searches (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        keywords TEXT NOT NULL,
        max_date TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS search_videos (
        search_id INTEGER NOT NULL REFERENCES searches (id),
        video_id TEXT NOT NULL,
        UNIQUE (search_id, video_id)
    )",
    "CREATE TABLE IF NOT EXISTS search_channels (
        search_id INTEGER NOT NULL REFERENCES searches (id),
        channel_id TEXT NOT NULL,
        UNIQUE (search_id, channel_id)
    )",
    "CREATE TABLE IF NOT EXISTS user_links (
        channel_id TEXT NOT NULL,
        source TEXT NOT NULL,
        target TEXT NOT NULL,
        weight INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS video_links (
        channel_id TEXT NOT NULL,
        source TEXT NOT NULL,
        target TEXT NOT NULL,
        weight INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS channel_links (
        channel_id TEXT NOT NULL DEFAULT '',
        source TEXT NOT NULL,
        target TEXT NOT NULL,
        weight INTEGER NOT NULL
    )",
];

const RESET_TABLES: &[&str] = &[
    "search_videos",
    "search_channels",
    "searches",
    "user_links",
    "video_links",
    "channel_links",
    "user_features",
    "video_features",
    "channel_features",
    "comments",
    "users",
    "videos",
    "channels",
];

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, CoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| {
                CoreError::Database(DatabaseError::ConnectionFailed {
                    reason: e.to_string(),
                })
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| {
                CoreError::Database(DatabaseError::ConnectionFailed {
                    reason: e.to_string(),
                })
            })?;

        debug!("Connected to database at {}", database_url);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        for statement in MIGRATIONS {
            sqlx::query(statement).execute(&self.pool).await.map_err(|e| {
                CoreError::Database(DatabaseError::MigrationFailed {
                    migration: e.to_string(),
                })
            })?;
        }
        info!("Database schema is up to date");
        Ok(())
    }

    /// Drop every row from every table. Destructive, used by the reset
    /// command only.
    pub async fn reset(&self) -> Result<(), CoreError> {
        for table in RESET_TABLES {
            let sql = format!("DELETE FROM {}", table);
            sqlx::query(&sql)
                .execute(&self.pool)
                .await
                .map_err(DatabaseError::from)
                .map_err(CoreError::Database)?;
        }
        info!("Database reset: all rows deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Channels
    // ------------------------------------------------------------------

    /// Insert or refresh a channel from fresh platform statistics. Lease
    /// columns are left untouched.
    pub async fn upsert_channel(&self, record: &ChannelRecord) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO channels
                (channel_id, name, description, created_at, view_count, subscriber_count, video_count)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (channel_id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                created_at = excluded.created_at,
                view_count = excluded.view_count,
                subscriber_count = excluded.subscriber_count,
                video_count = excluded.video_count",
        )
        .bind(&record.channel_id)
        .bind(&record.title)
        .bind(&record.description)
        .bind(record.published_at)
        .bind(record.view_count)
        .bind(record.subscriber_count)
        .bind(record.video_count)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(())
    }

    pub async fn get_channel(&self, channel_id: &str) -> Result<Option<Channel>, CoreError> {
        let channel = sqlx::query_as::<_, Channel>(
            "SELECT * FROM channels WHERE channel_id = ?",
        )
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(channel)
    }

    pub async fn list_channels(&self) -> Result<Vec<Channel>, CoreError> {
        let channels = sqlx::query_as::<_, Channel>("SELECT * FROM channels ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from)
            .map_err(CoreError::Database)?;
        Ok(channels)
    }

    pub async fn set_channel_comment_count(
        &self,
        channel_id: &str,
        count: i64,
    ) -> Result<(), CoreError> {
        sqlx::query("UPDATE channels SET comments_count = ? WHERE channel_id = ?")
            .bind(count)
            .bind(channel_id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from)
            .map_err(CoreError::Database)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Update leases
    // ------------------------------------------------------------------

    /// Try to take the update lease for a channel. The conditional UPDATE
    /// makes acquisition atomic: it succeeds only when no lease is held or
    /// the held lease has expired.
    pub async fn acquire_lease(
        &self,
        channel_id: &str,
        owner: &str,
        duration: Duration,
    ) -> Result<(), CoreError> {
        let now = Utc::now();
        let expires_at = now + duration;

        let result = sqlx::query(
            "UPDATE channels
             SET lease_owner = ?, lease_expires_at = ?
             WHERE channel_id = ?
               AND (lease_owner IS NULL OR lease_expires_at < ?)",
        )
        .bind(owner)
        .bind(expires_at)
        .bind(channel_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::LeaseHeld {
                channel_id: channel_id.to_string(),
            });
        }
        debug!("Lease on channel {} acquired by {}", channel_id, owner);
        Ok(())
    }

    /// Release a lease held by `owner`. Releasing a lease that was lost to
    /// expiry is a no-op rather than an error.
    pub async fn release_lease(&self, channel_id: &str, owner: &str) -> Result<(), CoreError> {
        sqlx::query(
            "UPDATE channels
             SET lease_owner = NULL, lease_expires_at = NULL
             WHERE channel_id = ? AND lease_owner = ?",
        )
        .bind(channel_id)
        .bind(owner)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Videos
    // ------------------------------------------------------------------

    pub async fn upsert_video(&self, record: &VideoRecord) -> Result<(), CoreError> {
        let tags = if record.tags.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&record.tags).map_err(CoreError::Serialization)?)
        };

        sqlx::query(
            "INSERT INTO videos
                (video_id, kind, published_at, channel_id, title, description, thumbnail,
                 tags, category_id, default_language, duration_secs, definition,
                 view_count, like_count, dislike_count, favorite_count, comment_count)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (video_id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                thumbnail = excluded.thumbnail,
                tags = excluded.tags,
                view_count = excluded.view_count,
                like_count = excluded.like_count,
                dislike_count = excluded.dislike_count,
                favorite_count = excluded.favorite_count,
                comment_count = excluded.comment_count",
        )
        .bind(&record.video_id)
        .bind(&record.kind)
        .bind(record.published_at)
        .bind(&record.channel_id)
        .bind(&record.title)
        .bind(&record.description)
        .bind(&record.thumbnail)
        .bind(tags)
        .bind(record.category_id)
        .bind(&record.default_language)
        .bind(record.duration_secs)
        .bind(&record.definition)
        .bind(record.view_count)
        .bind(record.like_count)
        .bind(record.dislike_count)
        .bind(record.favorite_count)
        .bind(record.comment_count)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(())
    }

    pub async fn get_video(&self, video_id: &str) -> Result<Option<Video>, CoreError> {
        let video = sqlx::query_as::<_, Video>("SELECT * FROM videos WHERE video_id = ?")
            .bind(video_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from)
            .map_err(CoreError::Database)?;
        Ok(video)
    }

    pub async fn list_videos(&self, channel_id: &str) -> Result<Vec<Video>, CoreError> {
        let videos = sqlx::query_as::<_, Video>(
            "SELECT * FROM videos WHERE channel_id = ? ORDER BY published_at",
        )
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(videos)
    }

    pub async fn list_video_ids(&self, channel_id: &str) -> Result<Vec<String>, CoreError> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT video_id FROM videos WHERE channel_id = ? ORDER BY published_at",
        )
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(ids)
    }

    /// A video's comments need a sync pass when the number of stored rows
    /// disagrees with the comment count the platform reports.
    pub async fn video_needs_comment_sync(
        &self,
        video_id: &str,
        reported_count: i64,
    ) -> Result<bool, CoreError> {
        let stored = self.stored_comment_count(video_id).await?;
        Ok(stored != reported_count)
    }

    pub async fn stored_comment_count(&self, video_id: &str) -> Result<i64, CoreError> {
        let stored = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM comments WHERE video_id = ?",
        )
        .bind(video_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(stored)
    }

    pub async fn channel_comment_count(&self, channel_id: &str) -> Result<i64, CoreError> {
        let stored = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM comments WHERE channel_id = ?",
        )
        .bind(channel_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(stored)
    }

    // ------------------------------------------------------------------
    // Searches
    // ------------------------------------------------------------------

    pub async fn create_search(
        &self,
        keywords: &str,
        max_date: DateTime<Utc>,
    ) -> Result<i64, CoreError> {
        let result = sqlx::query("INSERT INTO searches (keywords, max_date, created_at) VALUES (?, ?, ?)")
            .bind(keywords)
            .bind(max_date)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from)
            .map_err(CoreError::Database)?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_search(&self, search_id: i64) -> Result<Option<Search>, CoreError> {
        let search = sqlx::query_as::<_, Search>("SELECT * FROM searches WHERE id = ?")
            .bind(search_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from)
            .map_err(CoreError::Database)?;
        Ok(search)
    }

    pub async fn link_search_video(&self, search_id: i64, video_id: &str) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT OR IGNORE INTO search_videos (search_id, video_id) VALUES (?, ?)",
        )
        .bind(search_id)
        .bind(video_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(())
    }

    pub async fn link_search_channel(
        &self,
        search_id: i64,
        channel_id: &str,
    ) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT OR IGNORE INTO search_channels (search_id, channel_id) VALUES (?, ?)",
        )
        .bind(search_id)
        .bind(channel_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(())
    }

    pub async fn search_video_ids(&self, search_id: i64) -> Result<Vec<String>, CoreError> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT video_id FROM search_videos WHERE search_id = ?",
        )
        .bind(search_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(ids)
    }

    pub async fn search_channel_ids(&self, search_id: i64) -> Result<Vec<String>, CoreError> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT channel_id FROM search_channels WHERE search_id = ?",
        )
        .bind(search_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(ids)
    }
}
