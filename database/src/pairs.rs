//! Co-occurrence queries. Edges are derived in SQL with self-joins ordered
//! on row id so each unordered pair appears exactly once and no node pairs
//! with itself.

use crate::Database;
use tracing::debug;
use tubegraph_core::{CoreError, DatabaseError, Link};

impl Database {
    /// Pairs of users who commented on at least one common video within the
    /// channel. Weight is the number of distinct shared videos.
    pub async fn user_pairs(&self, channel_id: &str) -> Result<Vec<Link>, CoreError> {
        let links = sqlx::query_as::<_, Link>(
            "SELECT u2.user_id AS source,
                    u1.user_id AS target,
                    COUNT(DISTINCT c1.video_id) AS weight,
                    c1.channel_id AS channel_id
             FROM comments c1
             JOIN comments c2
               ON c1.video_id = c2.video_id AND c1.author_id > c2.author_id
             JOIN users u1 ON u1.id = c1.author_id
             JOIN users u2 ON u2.id = c2.author_id
             WHERE c1.channel_id = ? AND c2.channel_id = ?
             GROUP BY c1.author_id, c2.author_id",
        )
        .bind(channel_id)
        .bind(channel_id)
        .fetch_all(self.pool())
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(links)
    }

    /// Pairs of videos that share at least one commenter. Weight is the
    /// number of distinct shared commenters.
    pub async fn video_pairs(&self, channel_id: &str) -> Result<Vec<Link>, CoreError> {
        let links = sqlx::query_as::<_, Link>(
            "SELECT v2.video_id AS source,
                    v1.video_id AS target,
                    COUNT(DISTINCT c1.author_id) AS weight,
                    c1.channel_id AS channel_id
             FROM comments c1
             JOIN comments c2
               ON c1.author_id = c2.author_id AND c1.video_id > c2.video_id
             JOIN videos v1 ON v1.video_id = c1.video_id
             JOIN videos v2 ON v2.video_id = c2.video_id
             WHERE c1.channel_id = ? AND c2.channel_id = ?
             GROUP BY c1.video_id, c2.video_id",
        )
        .bind(channel_id)
        .bind(channel_id)
        .fetch_all(self.pool())
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(links)
    }

    /// Pairs of channels that share commenters. Weight is the number of
    /// distinct platform accounts seen in both.
    pub async fn channel_pairs(&self) -> Result<Vec<Link>, CoreError> {
        let links = sqlx::query_as::<_, Link>(
            "SELECT u2.channel_id AS source,
                    u1.channel_id AS target,
                    COUNT(DISTINCT u1.user_id) AS weight,
                    '' AS channel_id
             FROM users u1
             JOIN users u2
               ON u1.user_id = u2.user_id AND u1.channel_id > u2.channel_id
             GROUP BY u1.channel_id, u2.channel_id",
        )
        .fetch_all(self.pool())
        .await
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(links)
    }

    pub async fn replace_user_links(
        &self,
        channel_id: &str,
        links: &[Link],
    ) -> Result<(), CoreError> {
        self.replace_links("user_links", Some(channel_id), links).await
    }

    pub async fn replace_video_links(
        &self,
        channel_id: &str,
        links: &[Link],
    ) -> Result<(), CoreError> {
        self.replace_links("video_links", Some(channel_id), links).await
    }

    pub async fn replace_channel_links(&self, links: &[Link]) -> Result<(), CoreError> {
        self.replace_links("channel_links", None, links).await
    }

    /// Swap the stored edge set in one transaction so readers never observe
    /// a half-written graph.
    async fn replace_links(
        &self,
        table: &str,
        channel_id: Option<&str>,
        links: &[Link],
    ) -> Result<(), CoreError> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(DatabaseError::from)
            .map_err(CoreError::Database)?;

        match channel_id {
            Some(channel_id) => {
                let sql = format!("DELETE FROM {} WHERE channel_id = ?", table);
                sqlx::query(&sql)
                    .bind(channel_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(DatabaseError::from)
                    .map_err(CoreError::Database)?;
            }
            None => {
                let sql = format!("DELETE FROM {}", table);
                sqlx::query(&sql)
                    .execute(&mut *tx)
                    .await
                    .map_err(DatabaseError::from)
                    .map_err(CoreError::Database)?;
            }
        }

        let sql = format!(
            "INSERT INTO {} (channel_id, source, target, weight) VALUES (?, ?, ?, ?)",
            table
        );
        for link in links {
            sqlx::query(&sql)
                .bind(&link.channel_id)
                .bind(&link.source)
                .bind(&link.target)
                .bind(link.weight)
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::from)
                .map_err(CoreError::Database)?;
        }

        tx.commit()
            .await
            .map_err(DatabaseError::from)
            .map_err(CoreError::Database)?;
        debug!("Replaced {} rows in {}", links.len(), table);
        Ok(())
    }

    pub async fn load_user_links(&self, channel_id: &str) -> Result<Vec<Link>, CoreError> {
        self.load_links("user_links", Some(channel_id)).await
    }

    pub async fn load_video_links(&self, channel_id: &str) -> Result<Vec<Link>, CoreError> {
        self.load_links("video_links", Some(channel_id)).await
    }

    pub async fn load_channel_links(&self) -> Result<Vec<Link>, CoreError> {
        self.load_links("channel_links", None).await
    }

    async fn load_links(
        &self,
        table: &str,
        channel_id: Option<&str>,
    ) -> Result<Vec<Link>, CoreError> {
        let links = match channel_id {
            Some(channel_id) => {
                let sql = format!("SELECT * FROM {} WHERE channel_id = ?", table);
                sqlx::query_as::<_, Link>(&sql)
                    .bind(channel_id)
                    .fetch_all(self.pool())
                    .await
            }
            None => {
                let sql = format!("SELECT * FROM {}", table);
                sqlx::query_as::<_, Link>(&sql).fetch_all(self.pool()).await
            }
        }
        .map_err(DatabaseError::from)
        .map_err(CoreError::Database)?;
        Ok(links)
    }
}
