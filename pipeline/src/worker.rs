//! Per-video ingestion unit: refresh the video row and, when the stored
//! comments disagree with the platform's count, crawl the comment threads
//! and replies page by page.

use database::Database;
use tracing::{debug, info};
use tubegraph_core::{CoreError, PlatformApiError};
use youtube_client::YoutubeApiClient;

#[derive(Debug, Clone, PartialEq)]
pub enum UnitStatus {
    /// Video stored; comments synced when needed.
    Completed { comments_saved: u64 },
    /// The platform has no record for this video id.
    Skipped,
    Failed { error: String },
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct UnitOutcome {
    pub video_id: String,
    pub status: UnitStatus,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub comments_saved: u64,
}

impl IngestReport {
    pub fn tally(outcomes: &[UnitOutcome]) -> Self {
        let mut report = Self::default();
        for outcome in outcomes {
            match &outcome.status {
                UnitStatus::Completed { comments_saved } => {
                    report.completed += 1;
                    report.comments_saved += comments_saved;
                }
                UnitStatus::Skipped => report.skipped += 1,
                UnitStatus::Failed { .. } => report.failed += 1,
                UnitStatus::TimedOut => report.timed_out += 1,
            }
        }
        report
    }
}

pub struct VideoWorker {
    db: Database,
    api: YoutubeApiClient,
    channel_id: String,
}

impl VideoWorker {
    pub fn new(db: Database, api: YoutubeApiClient, channel_id: &str) -> Self {
        Self {
            db,
            api,
            channel_id: channel_id.to_string(),
        }
    }

    pub async fn ingest(&self, video_id: &str) -> Result<UnitStatus, CoreError> {
        let record = match self.api.video_details(video_id).await? {
            Some(record) => record,
            None => return Ok(UnitStatus::Skipped),
        };
        self.db.upsert_video(&record).await?;

        if !self
            .db
            .video_needs_comment_sync(video_id, record.comment_count)
            .await?
        {
            debug!("Comments for video {} are in sync", video_id);
            return Ok(UnitStatus::Completed { comments_saved: 0 });
        }

        let comments_saved = self.sync_comments(video_id).await?;
        info!("Video {}: {} comments saved", video_id, comments_saved);
        Ok(UnitStatus::Completed { comments_saved })
    }

    async fn sync_comments(&self, video_id: &str) -> Result<u64, CoreError> {
        let mut saved: u64 = 0;
        let mut token: Option<String> = None;

        loop {
            let page = match self
                .api
                .comment_threads_page(video_id, token.as_deref())
                .await
            {
                Ok(page) => page,
                Err(CoreError::PlatformApi(PlatformApiError::CommentsDisabled { .. })) => {
                    debug!("Comments are disabled on video {}", video_id);
                    return Ok(saved);
                }
                Err(e) => return Err(e),
            };

            for thread in page.items {
                let comment_id = thread.comment_id.clone();
                let reply_count = thread.reply_count;
                if self.db.save_comment(&thread, &self.channel_id, video_id).await? {
                    saved += 1;
                }
                if reply_count > 0 {
                    saved += self.sync_replies(&comment_id, video_id).await?;
                }
            }

            match page.next_page_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(saved)
    }

    async fn sync_replies(&self, parent_id: &str, video_id: &str) -> Result<u64, CoreError> {
        let mut saved: u64 = 0;
        let mut token: Option<String> = None;

        loop {
            let page = self
                .api
                .comment_replies_page(parent_id, token.as_deref())
                .await?;
            for reply in page.items {
                if self.db.save_comment(&reply, &self.channel_id, video_id).await? {
                    saved += 1;
                }
            }
            match page.next_page_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(video_id: &str, status: UnitStatus) -> UnitOutcome {
        UnitOutcome {
            video_id: video_id.to_string(),
            status,
        }
    }

    #[test]
    fn test_tally_counts_each_status() {
        let outcomes = vec![
            outcome("v1", UnitStatus::Completed { comments_saved: 10 }),
            outcome("v2", UnitStatus::Completed { comments_saved: 5 }),
            outcome("v3", UnitStatus::Skipped),
            outcome(
                "v4",
                UnitStatus::Failed {
                    error: "boom".to_string(),
                },
            ),
            outcome("v5", UnitStatus::TimedOut),
        ];
        let report = IngestReport::tally(&outcomes);
        assert_eq!(report.completed, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.timed_out, 1);
        assert_eq!(report.comments_saved, 15);
    }

    #[test]
    fn test_tally_empty() {
        assert_eq!(IngestReport::tally(&[]), IngestReport::default());
    }
}
