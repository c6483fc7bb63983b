//! User and comment persistence. Users are scoped to a channel: the same
//! platform account commenting on two channels yields two rows.

use crate::Database;
use tracing::{debug, warn};
use tubegraph_core::{Comment, CoreError, DatabaseError, User};
use youtube_client::CommentRecord;

impl Database {
    /// Insert the author if unseen in this channel, otherwise refresh the
    /// display name. The unique constraint on (user_id, channel_id) makes
    /// this safe under concurrent ingestion workers. Returns the row id.
    pub async fn upsert_user(
        &self,
        user_id: &str,
        user_name: &str,
        channel_id: &str,
    ) -> Result<i64, CoreError> {
        let row_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (user_id, user_name, channel_id)
             VALUES (?, ?, ?)
             ON CONFLICT (user_id, channel_id) DO UPDATE SET user_name = excluded.user_name
             RETURNING id",
        )
        .bind(user_id)
        .bind(user_name)
        .bind(channel_id)
        .fetch_one(self.pool())
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(row_id)
    }

    /// Persist one comment. Re-ingesting a known comment updates the mutable
    /// columns in place instead of appending a duplicate row.
    ///
    /// A reply whose parent thread comment is not stored is skipped with a
    /// warning; inserting it would leave a dangling parent reference.
    pub async fn save_comment(
        &self,
        record: &CommentRecord,
        channel_id: &str,
        video_id: &str,
    ) -> Result<bool, CoreError> {
        let author_row_id = self
            .upsert_user(&record.author_id, &record.author_name, channel_id)
            .await?;

        let parent_row_id = match &record.parent_comment_id {
            Some(parent_comment_id) => {
                match self.comment_row_id(parent_comment_id).await? {
                    Some(row_id) => Some(row_id),
                    None => {
                        warn!(
                            "Skipping orphan reply {}: parent {} is not stored",
                            record.comment_id, parent_comment_id
                        );
                        return Ok(false);
                    }
                }
            }
            None => None,
        };

        let video_id = record.video_id.as_deref().unwrap_or(video_id);

        sqlx::query(
            "INSERT INTO comments
                (comment_id, author_id, kind, like_count, parent_id, published_at, updated_at,
                 text_display, text_original, video_id, channel_id, reply_count)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (comment_id) DO UPDATE SET
                like_count = excluded.like_count,
                updated_at = excluded.updated_at,
                text_display = excluded.text_display,
                text_original = excluded.text_original,
                reply_count = excluded.reply_count",
        )
        .bind(&record.comment_id)
        .bind(author_row_id)
        .bind(&record.kind)
        .bind(record.like_count)
        .bind(parent_row_id)
        .bind(record.published_at)
        .bind(record.updated_at)
        .bind(&record.text_display)
        .bind(&record.text_original)
        .bind(video_id)
        .bind(channel_id)
        .bind(record.reply_count)
        .execute(self.pool())
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;

        debug!("Saved comment {} on video {}", record.comment_id, video_id);
        Ok(true)
    }

    pub async fn comment_row_id(&self, comment_id: &str) -> Result<Option<i64>, CoreError> {
        let row_id = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM comments WHERE comment_id = ?",
        )
        .bind(comment_id)
        .fetch_optional(self.pool())
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(row_id)
    }

    pub async fn list_comments_for_video(&self, video_id: &str) -> Result<Vec<Comment>, CoreError> {
        let comments = sqlx::query_as::<_, Comment>(
            "SELECT * FROM comments WHERE video_id = ? ORDER BY published_at",
        )
        .bind(video_id)
        .fetch_all(self.pool())
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(comments)
    }

    pub async fn list_users(&self, channel_id: &str) -> Result<Vec<User>, CoreError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE channel_id = ? ORDER BY id",
        )
        .bind(channel_id)
        .fetch_all(self.pool())
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(users)
    }

    pub async fn get_user(&self, user_id: &str, channel_id: &str) -> Result<Option<User>, CoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE user_id = ? AND channel_id = ?",
        )
        .bind(user_id)
        .bind(channel_id)
        .fetch_optional(self.pool())
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, CoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(DatabaseError::from)
            .map_err(CoreError::Database)?;
        Ok(user)
    }

    /// Recompute the per-user aggregates from the stored comments. Run once
    /// after ingestion instead of incrementing counters on every insert.
    pub async fn recompute_user_aggregates(&self, channel_id: &str) -> Result<(), CoreError> {
        sqlx::query(
            "UPDATE users SET
                videos_commented = (
                    SELECT COUNT(DISTINCT c.video_id) FROM comments c WHERE c.author_id = users.id
                ),
                like_count = (
                    SELECT COALESCE(SUM(c.like_count), 0) FROM comments c WHERE c.author_id = users.id
                )
             WHERE channel_id = ?",
        )
        .bind(channel_id)
        .execute(self.pool())
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        debug!("Recomputed user aggregates for channel {}", channel_id);
        Ok(())
    }
}
