//! Channel update orchestration. One pipeline run takes a channel from
//! `idle` through `leased`, `ingesting` and `computing-features` back to
//! `idle`; the database lease is the only concurrency guard.

pub mod worker;

use crate::worker::{IngestReport, UnitOutcome, UnitStatus, VideoWorker};
use chrono::{DateTime, Utc};
use database::Database;
use graph_engine::{FeatureComputer, FeatureSettings, RunSummary};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::timeout;
use tracing::{error, info, warn};
use tubegraph_core::{AppConfig, CoreError};
use uuid::Uuid;
use youtube_client::{SearchQuery, YoutubeApiClient};

pub struct Pipeline {
    db: Database,
    api: YoutubeApiClient,
    config: AppConfig,
    worker_id: String,
}

impl Pipeline {
    pub fn new(db: Database, api: YoutubeApiClient, config: AppConfig) -> Self {
        Self {
            db,
            api,
            config,
            worker_id: format!("pipeline-{}", Uuid::new_v4()),
        }
    }

    /// Full refresh of one channel: statistics, videos, comments, user
    /// aggregates, graphs, feature snapshot and link tables. A channel whose
    /// lease is held elsewhere is left untouched and `None` is returned.
    pub async fn update_channel(&self, channel_id: &str) -> Result<Option<RunSummary>, CoreError> {
        // The lease lives on the channel row, so first contact fetches one.
        if self.db.get_channel(channel_id).await?.is_none() {
            let record = self.api.channel_statistics(channel_id).await?;
            self.db.upsert_channel(&record).await?;
        }

        match self
            .db
            .acquire_lease(channel_id, &self.worker_id, self.config.lease_duration())
            .await
        {
            Ok(()) => {}
            Err(CoreError::LeaseHeld { channel_id }) => {
                info!("Channel {} is being updated elsewhere, skipping", channel_id);
                return Ok(None);
            }
            Err(e) => return Err(e),
        }
        info!("Starting update of channel {}", channel_id);

        let result = self.run_leased_update(channel_id).await;

        // The lease is released on success and failure alike; an expired
        // lease makes even a missed release recoverable.
        if let Err(e) = self.db.release_lease(channel_id, &self.worker_id).await {
            error!("Failed to release lease on channel {}: {}", channel_id, e);
        }

        result.map(Some)
    }

    async fn run_leased_update(&self, channel_id: &str) -> Result<RunSummary, CoreError> {
        let record = self.api.channel_statistics(channel_id).await?;
        self.db.upsert_channel(&record).await?;

        let query = SearchQuery::for_channel(channel_id);
        let hits = self.api.list_videos(&query, self.config.max_videos).await?;
        let video_ids: Vec<String> = hits.into_iter().map(|hit| hit.video_id).collect();

        let report = self.ingest_videos(channel_id, video_ids).await;
        info!(
            "Channel {} ingestion: {} completed, {} failed, {} timed out, {} comments saved",
            channel_id, report.completed, report.failed, report.timed_out, report.comments_saved
        );

        self.db.recompute_user_aggregates(channel_id).await?;
        let comment_count = self.db.channel_comment_count(channel_id).await?;
        self.db
            .set_channel_comment_count(channel_id, comment_count)
            .await?;

        let settings = FeatureSettings {
            compute_betweenness: self.config.compute_betweenness,
            betweenness_samples: self.config.betweenness_samples,
        };
        let computer = FeatureComputer::new(&self.db, &self.api, settings);
        let summary = computer.compute_channel_run(channel_id).await?;

        let channel_links = self.db.channel_pairs().await?;
        self.db.replace_channel_links(&channel_links).await?;

        Ok(summary)
    }

    /// Refresh every known channel. Per-channel failures are logged and the
    /// iteration continues; a channel whose lease is held elsewhere is
    /// skipped silently. Returns the number of channels updated.
    pub async fn update_all(&self) -> Result<usize, CoreError> {
        let channels = self.db.list_channels().await?;
        let mut updated = 0;

        for channel in channels {
            match self.update_channel(&channel.channel_id).await {
                Ok(Some(summary)) => {
                    updated += 1;
                    info!(
                        "Updated channel {} ({} users, {} videos)",
                        channel.channel_id, summary.user_count, summary.video_count
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Update of channel {} failed: {}", channel.channel_id, e);
                }
            }
        }

        Ok(updated)
    }

    /// Record a keyword search, discover matching videos and ingest them.
    /// Feature computation stays per-channel and is not triggered here.
    pub async fn start_search(
        &self,
        keywords: &str,
        max_videos: Option<usize>,
        published_after: Option<DateTime<Utc>>,
    ) -> Result<i64, CoreError> {
        let cutoff = search_cutoff(published_after);
        let cap = max_videos.unwrap_or(self.config.max_videos);
        let search_id = self.db.create_search(keywords, cutoff).await?;
        let query = SearchQuery::for_keywords(keywords, Some(cutoff));
        let hits = self.api.list_videos(&query, cap).await?;
        info!("Search {} ({:?}) matched {} videos", search_id, keywords, hits.len());

        let mut by_channel: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for hit in hits {
            self.db.link_search_video(search_id, &hit.video_id).await?;
            self.db.link_search_channel(search_id, &hit.channel_id).await?;
            by_channel.entry(hit.channel_id).or_default().push(hit.video_id);
        }

        for (channel_id, video_ids) in by_channel {
            match self.api.channel_statistics(&channel_id).await {
                Ok(record) => self.db.upsert_channel(&record).await?,
                Err(e) => {
                    warn!("Skipping channel {} from search: {}", channel_id, e);
                    continue;
                }
            }
            let report = self.ingest_videos(&channel_id, video_ids).await;
            info!(
                "Search {}: channel {} ingested ({} completed, {} failed)",
                search_id, channel_id, report.completed, report.failed
            );
        }

        Ok(search_id)
    }

    /// Fan one unit of work per video out over a bounded pool. Every unit
    /// runs under its own deadline and reports through a result channel;
    /// a failed or expired unit never takes its siblings down.
    async fn ingest_videos(&self, channel_id: &str, video_ids: Vec<String>) -> IngestReport {
        if video_ids.is_empty() {
            return IngestReport::default();
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_workers));
        let (tx, mut rx) = mpsc::channel::<UnitOutcome>(video_ids.len());
        let deadline = self.config.unit_timeout();
        let unit_count = video_ids.len();

        for video_id in video_ids {
            let semaphore = semaphore.clone();
            let tx = tx.clone();
            let worker = VideoWorker::new(self.db.clone(), self.api.clone(), channel_id);

            tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };

                let status = match timeout(deadline, worker.ingest(&video_id)).await {
                    Ok(Ok(stats)) => stats,
                    Ok(Err(e)) => {
                        warn!("Ingestion of video {} failed: {}", video_id, e);
                        UnitStatus::Failed {
                            error: e.to_string(),
                        }
                    }
                    Err(_) => {
                        warn!(
                            "Ingestion of video {} exceeded its {:?} deadline",
                            video_id, deadline
                        );
                        UnitStatus::TimedOut
                    }
                };
                let _ = tx.send(UnitOutcome { video_id, status }).await;
            });
        }
        drop(tx);

        let mut outcomes = Vec::with_capacity(unit_count);
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
        }
        IngestReport::tally(&outcomes)
    }
}

/// Cutoff stored on the search row and used as the query's `publishedAfter`
/// bound. An omitted cutoff means unbounded discovery.
fn search_cutoff(published_after: Option<DateTime<Utc>>) -> DateTime<Utc> {
    published_after.unwrap_or(DateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use youtube_client::ChannelRecord;

    async fn test_db() -> Database {
        let path = std::env::temp_dir().join(format!("pipeline-test-{}.db", Uuid::new_v4()));
        let url = format!("sqlite://{}", path.display());
        let db = Database::connect(&url).await.unwrap();
        db.run_migrations().await.unwrap();
        db
    }

    fn test_config() -> AppConfig {
        AppConfig {
            database_url: String::new(),
            api_keys: vec!["key".to_string()],
            max_workers: 4,
            unit_timeout_secs: 30,
            max_videos: 100,
            compute_betweenness: false,
            betweenness_samples: 16,
            lease_secs: 3600,
            export_dir: "exports".to_string(),
            neo4j_uri: None,
            neo4j_user: None,
            neo4j_password: None,
        }
    }

    fn channel_record(channel_id: &str) -> ChannelRecord {
        ChannelRecord {
            channel_id: channel_id.to_string(),
            title: "A channel".to_string(),
            description: String::new(),
            published_at: None,
            view_count: 0,
            subscriber_count: 0,
            video_count: 0,
        }
    }

    #[tokio::test]
    async fn test_update_channel_noop_when_lease_held_elsewhere() {
        let db = test_db().await;
        db.upsert_channel(&channel_record("UCheld")).await.unwrap();
        db.acquire_lease("UCheld", "other-runner", chrono::Duration::hours(1))
            .await
            .unwrap();

        let api = YoutubeApiClient::new(vec!["key".to_string()]).unwrap();
        let runner = Pipeline::new(db.clone(), api, test_config());

        let outcome = runner.update_channel("UCheld").await.unwrap();
        assert!(outcome.is_none());

        // The foreign lease survives the skipped run.
        let err = db
            .acquire_lease("UCheld", "third-runner", chrono::Duration::hours(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::LeaseHeld { .. }));
    }

    #[test]
    fn test_search_cutoff_keeps_caller_date() {
        let date = Utc.with_ymd_and_hms(2020, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(search_cutoff(Some(date)), date);
        assert_eq!(search_cutoff(None), DateTime::UNIX_EPOCH);
    }
}
