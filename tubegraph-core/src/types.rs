use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A commenter. Created on the first comment seen from the author within a
/// channel; the aggregate counters are recomputed after each ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub user_id: String,
    pub user_name: String,
    pub videos_commented: i64,
    pub like_count: i64,
    pub channel_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub comment_id: String,
    pub author_id: i64,
    pub kind: String,
    pub like_count: i64,
    /// Row id of the parent comment when this is a reply.
    pub parent_id: Option<i64>,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub text_display: String,
    pub text_original: String,
    pub video_id: String,
    pub channel_id: String,
    pub reply_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Video {
    pub id: i64,
    pub video_id: String,
    pub kind: String,
    pub published_at: DateTime<Utc>,
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    /// JSON-encoded tag list, empty when the platform returned none.
    pub tags: Option<String>,
    pub category_id: i64,
    pub default_language: Option<String>,
    pub duration_secs: i64,
    pub definition: String,
    pub view_count: i64,
    pub like_count: i64,
    pub dislike_count: i64,
    pub favorite_count: i64,
    pub comment_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Channel {
    pub id: i64,
    pub channel_id: String,
    pub name: String,
    pub description: String,
    pub created_at: Option<DateTime<Utc>>,
    pub view_count: i64,
    pub subscriber_count: i64,
    pub video_count: i64,
    pub comments_count: i64,
    pub lease_owner: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,
}

/// Point-in-time metrics for one user. Append-only: every pipeline run
/// inserts a fresh generation keyed by `run_at`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserFeature {
    pub id: i64,
    pub run_at: DateTime<Utc>,
    pub channel_id: String,
    pub user_id: String,
    pub page_rank: f64,
    pub weighted_degree: f64,
    pub betweenness: Option<f64>,
    pub videos_commented: i64,
    pub like_count: i64,
    pub subscriber_count: i64,
    pub view_count: i64,
    pub video_count: i64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VideoFeature {
    pub id: i64,
    pub run_at: DateTime<Utc>,
    pub channel_id: String,
    pub video_id: String,
    pub page_rank: f64,
    pub weighted_degree: f64,
    pub betweenness: Option<f64>,
    pub view_count: i64,
    pub like_count: i64,
    pub dislike_count: i64,
    pub favorite_count: i64,
    pub comment_count: i64,
    /// Sum of `videos_commented` over the distinct users who commented on
    /// this video. A proxy for how influential the video's commenters are.
    pub users_power: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChannelFeature {
    pub id: i64,
    pub run_at: DateTime<Utc>,
    pub channel_id: String,
    pub view_count: i64,
    pub subscriber_count: i64,
    pub video_count: i64,
    pub comments_count: i64,
    pub user_node_count: i64,
    pub user_edge_count: i64,
    pub video_node_count: i64,
    pub video_edge_count: i64,
}

/// A saved discovery query.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Search {
    pub id: i64,
    pub keywords: String,
    pub max_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A persisted co-occurrence edge between two external identifiers.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Link {
    pub source: String,
    pub target: String,
    pub weight: i64,
    pub channel_id: String,
}
