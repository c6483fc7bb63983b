//! One-shot batch export of a search's slice of the store: delimited files
//! for the graph database's bulk loader plus the Cypher import script that
//! consumes them. Not a live sync.

pub mod cypher;

use chrono::Utc;
use database::Database;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::info;
use tubegraph_core::{CoreError, ExportError};

/// Paths of one export generation, all sharing a `{search_id}_{timestamp}`
/// prefix so successive exports never clobber each other.
#[derive(Debug, Clone)]
pub struct ExportBundle {
    pub prefix: String,
    pub videos: PathBuf,
    pub comments: PathBuf,
    pub users: PathBuf,
    pub user_links: PathBuf,
    pub video_links: PathBuf,
    pub topics: PathBuf,
    pub topic_links: PathBuf,
}

pub struct Exporter<'a> {
    db: &'a Database,
    export_dir: PathBuf,
}

impl<'a> Exporter<'a> {
    pub fn new(db: &'a Database, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            db,
            export_dir: export_dir.into(),
        }
    }

    /// Write the delimited files for one search.
    pub async fn export_search(&self, search_id: i64) -> Result<ExportBundle, CoreError> {
        let search = self
            .db
            .get_search(search_id)
            .await?
            .ok_or(CoreError::Export(ExportError::SearchNotFound { search_id }))?;

        std::fs::create_dir_all(&self.export_dir).map_err(|_| {
            CoreError::Export(ExportError::DirectoryNotWritable {
                path: self.export_dir.display().to_string(),
            })
        })?;

        let prefix = format!(
            "{}_{}",
            search.id,
            Utc::now().format("%Y-%m-%dT%H-%M-%S")
        );
        let path = |suffix: &str| self.export_dir.join(format!("{}_{}.csv", prefix, suffix));
        let bundle = ExportBundle {
            videos: path("videos_export"),
            comments: path("comments_export"),
            users: path("users_export"),
            user_links: path("userlinks_export"),
            video_links: path("videolinks_export"),
            topics: path("topics_export"),
            topic_links: path("topiclinks_export"),
            prefix,
        };

        let video_ids = self.db.search_video_ids(search_id).await?;
        let channel_ids = self.db.search_channel_ids(search_id).await?;

        self.write_videos(&bundle.videos, &video_ids).await?;
        let author_ids = self.write_comments(&bundle.comments, &video_ids).await?;
        self.write_users(&bundle.users, &author_ids).await?;
        self.write_links(&bundle.user_links, &channel_ids, LinkKind::User)
            .await?;
        self.write_links(&bundle.video_links, &channel_ids, LinkKind::Video)
            .await?;

        // Topic extraction is not part of this system; header-only files
        // keep the import script uniform.
        write_delimited(&bundle.topics, &["id", "words"], &[])?;
        write_delimited(&bundle.topic_links, &["source", "target", "weight"], &[])?;

        info!(
            "Exported search {} to {} ({} videos)",
            search_id,
            self.export_dir.display(),
            video_ids.len()
        );
        Ok(bundle)
    }

    async fn write_videos(&self, path: &Path, video_ids: &[String]) -> Result<(), CoreError> {
        let header = [
            "id",
            "videoId",
            "publishedAt",
            "channelId",
            "title",
            "description",
            "categoryId",
            "duration",
            "definition",
            "viewCount",
            "likeCount",
            "dislikeCount",
            "favoriteCount",
            "commentCount",
        ];
        let mut rows = Vec::new();
        for video_id in video_ids {
            let Some(video) = self.db.get_video(video_id).await? else {
                continue;
            };
            rows.push(vec![
                video.id.to_string(),
                video.video_id,
                video.published_at.to_rfc3339(),
                video.channel_id,
                sanitize_field(&video.title),
                sanitize_field(&video.description),
                video.category_id.to_string(),
                video.duration_secs.to_string(),
                video.definition,
                video.view_count.to_string(),
                video.like_count.to_string(),
                video.dislike_count.to_string(),
                video.favorite_count.to_string(),
                video.comment_count.to_string(),
            ]);
        }
        write_delimited(path, &header, &rows)
    }

    /// Writes the comment rows and returns the distinct author row ids seen.
    async fn write_comments(
        &self,
        path: &Path,
        video_ids: &[String],
    ) -> Result<BTreeSet<i64>, CoreError> {
        let header = [
            "id",
            "author_id",
            "commentId",
            "likeCount",
            "parentCom_id",
            "publishedAt",
            "textDisplay",
            "videoId",
            "channelId",
            "replyCount",
        ];
        let mut rows = Vec::new();
        let mut author_ids = BTreeSet::new();
        for video_id in video_ids {
            for comment in self.db.list_comments_for_video(video_id).await? {
                author_ids.insert(comment.author_id);
                rows.push(vec![
                    comment.id.to_string(),
                    comment.author_id.to_string(),
                    comment.comment_id,
                    comment.like_count.to_string(),
                    comment.parent_id.map(|p| p.to_string()).unwrap_or_default(),
                    comment.published_at.to_rfc3339(),
                    sanitize_field(&comment.text_display),
                    comment.video_id,
                    comment.channel_id,
                    comment.reply_count.to_string(),
                ]);
            }
        }
        write_delimited(path, &header, &rows)?;
        Ok(author_ids)
    }

    async fn write_users(&self, path: &Path, author_ids: &BTreeSet<i64>) -> Result<(), CoreError> {
        let header = ["id", "userId", "userName"];
        let mut rows = Vec::new();
        for &author_id in author_ids {
            let Some(user) = self.db.get_user_by_id(author_id).await? else {
                continue;
            };
            rows.push(vec![
                user.id.to_string(),
                user.user_id,
                sanitize_field(&user.user_name),
            ]);
        }
        write_delimited(path, &header, &rows)
    }

    async fn write_links(
        &self,
        path: &Path,
        channel_ids: &[String],
        kind: LinkKind,
    ) -> Result<(), CoreError> {
        let header = ["source", "target", "weight"];
        let mut rows = Vec::new();
        for channel_id in channel_ids {
            let links = match kind {
                LinkKind::User => self.db.load_user_links(channel_id).await?,
                LinkKind::Video => self.db.load_video_links(channel_id).await?,
            };
            for link in links {
                rows.push(vec![link.source, link.target, link.weight.to_string()]);
            }
        }
        write_delimited(path, &header, &rows)
    }
}

enum LinkKind {
    User,
    Video,
}

/// Comma-delimited with a header row. Fields are pre-sanitized, so no
/// quoting layer is needed on top.
fn write_delimited(path: &Path, header: &[&str], rows: &[Vec<String>]) -> Result<(), CoreError> {
    let mut out = String::new();
    out.push_str(&header.join(","));
    out.push('\n');
    for row in rows {
        out.push_str(&row.join(","));
        out.push('\n');
    }
    std::fs::write(path, out).map_err(CoreError::Io)
}

/// Strip the characters that would break the delimited format: newlines,
/// tabs, commas and double quotes all become spaces.
fn sanitize_field(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '\n' | '\r' | '\t' | ',' | '"' => ' ',
            other => other,
        })
        .collect()
}
