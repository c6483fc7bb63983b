//! Feature computation for one channel run. Joins graph metrics with stored
//! aggregates and live platform statistics, then writes one immutable
//! snapshot generation keyed by a shared `run_at` timestamp.

use crate::builder::{build_graph, CoGraph};
use crate::metrics::{
    pagerank, sampled_betweenness, weighted_degree, PAGERANK_DAMPING, PAGERANK_MAX_ITERATIONS,
    PAGERANK_TOLERANCE,
};
use chrono::{DateTime, Utc};
use database::Database;
use petgraph::graph::NodeIndex;
use tracing::{info, warn};
use tubegraph_core::{ChannelFeature, CoreError, User, UserFeature, Video, VideoFeature};
use youtube_client::{ChannelRecord, YoutubeApiClient};

#[derive(Debug, Clone)]
pub struct FeatureSettings {
    pub compute_betweenness: bool,
    pub betweenness_samples: usize,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            compute_betweenness: false,
            betweenness_samples: 64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_at: DateTime<Utc>,
    pub user_count: usize,
    pub video_count: usize,
    pub user_edge_count: usize,
    pub video_edge_count: usize,
}

/// All per-node metrics for one graph, indexed by node handle.
struct NodeMetrics {
    page_rank: Vec<f64>,
    weighted_degree: Vec<f64>,
    betweenness: Option<Vec<f64>>,
}

impl NodeMetrics {
    fn compute(co: &CoGraph, settings: &FeatureSettings) -> Self {
        let page_rank = pagerank(
            &co.graph,
            PAGERANK_DAMPING,
            PAGERANK_TOLERANCE,
            PAGERANK_MAX_ITERATIONS,
        );
        let weighted_degree = weighted_degree(&co.graph);
        let betweenness = settings
            .compute_betweenness
            .then(|| sampled_betweenness(&co.graph, settings.betweenness_samples));
        Self {
            page_rank,
            weighted_degree,
            betweenness,
        }
    }

    /// Metrics for one node; nodes absent from the graph get zeros.
    fn at(&self, handle: Option<NodeIndex>) -> (f64, f64, Option<f64>) {
        match handle {
            Some(handle) => {
                let i = handle.index();
                (
                    self.page_rank.get(i).copied().unwrap_or(0.0),
                    self.weighted_degree.get(i).copied().unwrap_or(0.0),
                    self.betweenness.as_ref().map(|b| b.get(i).copied().unwrap_or(0.0)),
                )
            }
            None => (0.0, 0.0, self.betweenness.as_ref().map(|_| 0.0)),
        }
    }
}

pub struct FeatureComputer<'a> {
    db: &'a Database,
    api: &'a YoutubeApiClient,
    settings: FeatureSettings,
}

impl<'a> FeatureComputer<'a> {
    pub fn new(db: &'a Database, api: &'a YoutubeApiClient, settings: FeatureSettings) -> Self {
        Self { db, api, settings }
    }

    /// Build both co-occurrence graphs for the channel, compute metrics,
    /// persist the feature snapshot and refresh the stored link tables.
    pub async fn compute_channel_run(&self, channel_id: &str) -> Result<RunSummary, CoreError> {
        let run_at = Utc::now();

        let users = self.db.list_users(channel_id).await?;
        let videos = self.db.list_videos(channel_id).await?;
        let user_links = self.db.user_pairs(channel_id).await?;
        let video_links = self.db.video_pairs(channel_id).await?;

        let user_ids: Vec<String> = users.iter().map(|u| u.user_id.clone()).collect();
        let video_ids: Vec<String> = videos.iter().map(|v| v.video_id.clone()).collect();
        let user_graph = build_graph(&user_ids, &user_links);
        let video_graph = build_graph(&video_ids, &video_links);

        let user_metrics = NodeMetrics::compute(&user_graph, &self.settings);
        let video_metrics = NodeMetrics::compute(&video_graph, &self.settings);

        let mut user_features = Vec::with_capacity(users.len());
        for user in &users {
            // Commenter accounts are themselves channels; their statistics
            // come from a live lookup. Accounts the platform no longer
            // resolves are skipped, not fatal.
            let platform = match self.api.channel_statistics(&user.user_id).await {
                Ok(record) => record,
                Err(CoreError::PlatformApi(e)) => {
                    warn!("Skipping features for user {}: {}", user.user_id, e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let metrics = user_metrics.at(user_graph.nodes.get(&user.user_id));
            user_features.push(user_feature_row(run_at, channel_id, user, &platform, metrics));
        }

        let mut video_features = Vec::with_capacity(videos.len());
        for video in &videos {
            let users_power = self.db.users_power(&video.video_id).await?;
            let metrics = video_metrics.at(video_graph.nodes.get(&video.video_id));
            video_features.push(video_feature_row(run_at, video, metrics, users_power));
        }

        self.db.insert_user_features(&user_features).await?;
        self.db.insert_video_features(&video_features).await?;
        self.db
            .insert_channel_feature(&self.channel_feature_row(channel_id, run_at, &user_graph, &video_graph).await?)
            .await?;

        self.db.replace_user_links(channel_id, &user_links).await?;
        self.db.replace_video_links(channel_id, &video_links).await?;

        info!(
            "Feature run for channel {} at {}: {} users, {} videos",
            channel_id,
            run_at,
            user_features.len(),
            video_features.len()
        );
        Ok(RunSummary {
            run_at,
            user_count: user_features.len(),
            video_count: video_features.len(),
            user_edge_count: user_graph.edge_count(),
            video_edge_count: video_graph.edge_count(),
        })
    }

    async fn channel_feature_row(
        &self,
        channel_id: &str,
        run_at: DateTime<Utc>,
        user_graph: &CoGraph,
        video_graph: &CoGraph,
    ) -> Result<ChannelFeature, CoreError> {
        let channel = self.db.get_channel(channel_id).await?.ok_or_else(|| {
            CoreError::NotFound {
                resource: format!("channel {}", channel_id),
            }
        })?;
        let comments_count = self.db.channel_comment_count(channel_id).await?;

        Ok(ChannelFeature {
            id: 0,
            run_at,
            channel_id: channel_id.to_string(),
            view_count: channel.view_count,
            subscriber_count: channel.subscriber_count,
            video_count: channel.video_count,
            comments_count,
            user_node_count: user_graph.node_count() as i64,
            user_edge_count: user_graph.edge_count() as i64,
            video_node_count: video_graph.node_count() as i64,
            video_edge_count: video_graph.edge_count() as i64,
        })
    }
}

fn user_feature_row(
    run_at: DateTime<Utc>,
    channel_id: &str,
    user: &User,
    platform: &ChannelRecord,
    (page_rank, weighted_degree, betweenness): (f64, f64, Option<f64>),
) -> UserFeature {
    UserFeature {
        id: 0,
        run_at,
        channel_id: channel_id.to_string(),
        user_id: user.user_id.clone(),
        page_rank,
        weighted_degree,
        betweenness,
        videos_commented: user.videos_commented,
        like_count: user.like_count,
        subscriber_count: platform.subscriber_count,
        view_count: platform.view_count,
        video_count: platform.video_count,
        description: platform.description.clone(),
    }
}

fn video_feature_row(
    run_at: DateTime<Utc>,
    video: &Video,
    (page_rank, weighted_degree, betweenness): (f64, f64, Option<f64>),
    users_power: i64,
) -> VideoFeature {
    VideoFeature {
        id: 0,
        run_at,
        channel_id: video.channel_id.clone(),
        video_id: video.video_id.clone(),
        page_rank,
        weighted_degree,
        betweenness,
        view_count: video.view_count,
        like_count: video.like_count,
        dislike_count: video.dislike_count,
        favorite_count: video.favorite_count,
        comment_count: video.comment_count,
        users_power,
    }
}
