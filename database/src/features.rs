//! Feature snapshot persistence. Feature tables are append-only: every
//! pipeline run inserts a new generation keyed by its `run_at` timestamp,
//! and history is never rewritten.

use crate::Database;
use chrono::{DateTime, Utc};
use tracing::debug;
use tubegraph_core::{ChannelFeature, CoreError, DatabaseError, UserFeature, VideoFeature};

impl Database {
    pub async fn insert_user_features(&self, features: &[UserFeature]) -> Result<(), CoreError> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(DatabaseError::from)
            .map_err(CoreError::Database)?;

        for feature in features {
            sqlx::query(
                "INSERT INTO user_features
                    (run_at, channel_id, user_id, page_rank, weighted_degree, betweenness,
                     videos_commented, like_count, subscriber_count, view_count, video_count,
                     description)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(feature.run_at)
            .bind(&feature.channel_id)
            .bind(&feature.user_id)
            .bind(feature.page_rank)
            .bind(feature.weighted_degree)
            .bind(feature.betweenness)
            .bind(feature.videos_commented)
            .bind(feature.like_count)
            .bind(feature.subscriber_count)
            .bind(feature.view_count)
            .bind(feature.video_count)
            .bind(&feature.description)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from)
            .map_err(CoreError::Database)?;
        }

        tx.commit()
            .await
            .map_err(DatabaseError::from)
            .map_err(CoreError::Database)?;
        debug!("Inserted {} user feature rows", features.len());
        Ok(())
    }

    pub async fn insert_video_features(&self, features: &[VideoFeature]) -> Result<(), CoreError> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(DatabaseError::from)
            .map_err(CoreError::Database)?;

        for feature in features {
            sqlx::query(
                "INSERT INTO video_features
                    (run_at, channel_id, video_id, page_rank, weighted_degree, betweenness,
                     view_count, like_count, dislike_count, favorite_count, comment_count,
                     users_power)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(feature.run_at)
            .bind(&feature.channel_id)
            .bind(&feature.video_id)
            .bind(feature.page_rank)
            .bind(feature.weighted_degree)
            .bind(feature.betweenness)
            .bind(feature.view_count)
            .bind(feature.like_count)
            .bind(feature.dislike_count)
            .bind(feature.favorite_count)
            .bind(feature.comment_count)
            .bind(feature.users_power)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from)
            .map_err(CoreError::Database)?;
        }

        tx.commit()
            .await
            .map_err(DatabaseError::from)
            .map_err(CoreError::Database)?;
        debug!("Inserted {} video feature rows", features.len());
        Ok(())
    }

    pub async fn insert_channel_feature(&self, feature: &ChannelFeature) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO channel_features
                (run_at, channel_id, view_count, subscriber_count, video_count, comments_count,
                 user_node_count, user_edge_count, video_node_count, video_edge_count)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(feature.run_at)
        .bind(&feature.channel_id)
        .bind(feature.view_count)
        .bind(feature.subscriber_count)
        .bind(feature.video_count)
        .bind(feature.comments_count)
        .bind(feature.user_node_count)
        .bind(feature.user_edge_count)
        .bind(feature.video_node_count)
        .bind(feature.video_edge_count)
        .execute(self.pool())
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(())
    }

    /// Sum of `videos_commented` across the distinct users who commented on
    /// the video. Proxies how active the video's audience is elsewhere in
    /// the channel.
    pub async fn users_power(&self, video_id: &str) -> Result<i64, CoreError> {
        let power = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(u.videos_commented), 0)
             FROM users u
             WHERE u.id IN (SELECT DISTINCT author_id FROM comments WHERE video_id = ?)",
        )
        .bind(video_id)
        .fetch_one(self.pool())
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(power)
    }

    /// The most recent feature generation timestamp for a channel, if any
    /// run has completed.
    pub async fn latest_run_at(&self, channel_id: &str) -> Result<Option<DateTime<Utc>>, CoreError> {
        let run_at = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT MAX(run_at) FROM channel_features WHERE channel_id = ?",
        )
        .bind(channel_id)
        .fetch_one(self.pool())
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(run_at)
    }

    pub async fn user_features_at(
        &self,
        channel_id: &str,
        run_at: DateTime<Utc>,
    ) -> Result<Vec<UserFeature>, CoreError> {
        let features = sqlx::query_as::<_, UserFeature>(
            "SELECT * FROM user_features WHERE channel_id = ? AND run_at = ? ORDER BY page_rank DESC",
        )
        .bind(channel_id)
        .bind(run_at)
        .fetch_all(self.pool())
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(features)
    }

    pub async fn video_features_at(
        &self,
        channel_id: &str,
        run_at: DateTime<Utc>,
    ) -> Result<Vec<VideoFeature>, CoreError> {
        let features = sqlx::query_as::<_, VideoFeature>(
            "SELECT * FROM video_features WHERE channel_id = ? AND run_at = ? ORDER BY page_rank DESC",
        )
        .bind(channel_id)
        .bind(run_at)
        .fetch_all(self.pool())
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(features)
    }

    pub async fn channel_feature_at(
        &self,
        channel_id: &str,
        run_at: DateTime<Utc>,
    ) -> Result<Option<ChannelFeature>, CoreError> {
        let feature = sqlx::query_as::<_, ChannelFeature>(
            "SELECT * FROM channel_features WHERE channel_id = ? AND run_at = ?",
        )
        .bind(channel_id)
        .bind(run_at)
        .fetch_optional(self.pool())
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(feature)
    }
}
