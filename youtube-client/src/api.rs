use crate::duration::parse_iso8601_seconds;
use crate::key_pool::KeyPool;
use crate::retry::{RetryConfig, RetryExecutor};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use tubegraph_core::{CoreError, PlatformApiError};

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const PAGE_SIZE_SEARCH: u32 = 50;
const PAGE_SIZE_COMMENTS: u32 = 100;

// ---------------------------------------------------------------------------
// Clean result records. One explicit type per endpoint; required and optional
// fields are spelled out instead of being discovered through key lookups.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub published_at: Option<DateTime<Utc>>,
    pub view_count: i64,
    pub subscriber_count: i64,
    pub video_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub video_id: String,
    pub channel_id: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub kind: String,
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub tags: Vec<String>,
    pub category_id: i64,
    pub default_language: Option<String>,
    pub published_at: DateTime<Utc>,
    pub duration_secs: i64,
    pub definition: String,
    pub view_count: i64,
    pub like_count: i64,
    pub dislike_count: i64,
    pub favorite_count: i64,
    pub comment_count: i64,
}

/// A flattened comment: either a top-level thread comment (`video_id` set)
/// or a reply fetched through the replies endpoint (`parent_comment_id` set).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRecord {
    pub comment_id: String,
    pub kind: String,
    pub author_id: String,
    pub author_name: String,
    pub like_count: i64,
    pub parent_comment_id: Option<String>,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub text_display: String,
    pub text_original: String,
    pub video_id: Option<String>,
    pub reply_count: i64,
}

/// One page of results plus the continuation token.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

/// Video discovery filters, mirroring the platform's search parameters.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub channel_id: Option<String>,
    pub words: Option<String>,
    pub published_after: Option<DateTime<Utc>>,
    pub published_before: Option<DateTime<Utc>>,
    pub region_code: Option<String>,
    pub relevance_language: Option<String>,
}

impl SearchQuery {
    pub fn for_channel(channel_id: &str) -> Self {
        Self {
            channel_id: Some(channel_id.to_string()),
            ..Default::default()
        }
    }

    pub fn for_keywords(words: &str, published_after: Option<DateTime<Utc>>) -> Self {
        Self {
            words: Some(words.to_string()),
            published_after,
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Wire formats
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PageEnvelope<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    id: String,
    snippet: ChannelSnippet,
    statistics: CountStatistics,
}

#[derive(Debug, Deserialize)]
struct ChannelSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "publishedAt")]
    published_at: Option<DateTime<Utc>>,
}

/// Statistics blocks carry counts as decimal strings; absent keys mean zero.
#[derive(Debug, Default, Deserialize)]
struct CountStatistics {
    #[serde(rename = "viewCount")]
    view_count: Option<String>,
    #[serde(rename = "subscriberCount")]
    subscriber_count: Option<String>,
    #[serde(rename = "videoCount")]
    video_count: Option<String>,
    #[serde(rename = "likeCount")]
    like_count: Option<String>,
    #[serde(rename = "dislikeCount")]
    dislike_count: Option<String>,
    #[serde(rename = "favoriteCount")]
    favorite_count: Option<String>,
    #[serde(rename = "commentCount")]
    comment_count: Option<String>,
}

fn count(raw: &Option<String>) -> i64 {
    raw.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0)
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: SearchSnippet,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchSnippet {
    #[serde(rename = "channelId")]
    channel_id: String,
    #[serde(default)]
    title: String,
    #[serde(rename = "publishedAt")]
    published_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    #[serde(default)]
    kind: String,
    id: String,
    snippet: VideoSnippet,
    #[serde(rename = "contentDetails")]
    content_details: ContentDetails,
    #[serde(default)]
    statistics: CountStatistics,
}

#[derive(Debug, Deserialize)]
struct VideoSnippet {
    #[serde(rename = "channelId")]
    channel_id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    thumbnails: Option<Thumbnails>,
    tags: Option<Vec<String>>,
    #[serde(rename = "categoryId", default)]
    category_id: String,
    #[serde(rename = "publishedAt")]
    published_at: DateTime<Utc>,
    #[serde(rename = "defaultLanguage")]
    default_language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    standard: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    #[serde(default)]
    duration: String,
    #[serde(default)]
    definition: String,
}

#[derive(Debug, Deserialize)]
struct ThreadItem {
    #[serde(default)]
    kind: String,
    id: String,
    snippet: ThreadSnippet,
}

#[derive(Debug, Deserialize)]
struct ThreadSnippet {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
    #[serde(rename = "totalReplyCount", default)]
    total_reply_count: i64,
    #[serde(rename = "topLevelComment")]
    top_level_comment: CommentItem,
}

#[derive(Debug, Deserialize)]
struct CommentItem {
    #[serde(default)]
    kind: String,
    id: String,
    snippet: CommentSnippet,
}

#[derive(Debug, Deserialize)]
struct CommentSnippet {
    #[serde(rename = "authorChannelId")]
    author_channel_id: Option<AuthorChannelId>,
    #[serde(rename = "authorDisplayName", default)]
    author_display_name: String,
    #[serde(rename = "likeCount", default)]
    like_count: i64,
    #[serde(rename = "parentId")]
    parent_id: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    updated_at: DateTime<Utc>,
    #[serde(rename = "textDisplay", default)]
    text_display: String,
    #[serde(rename = "textOriginal", default)]
    text_original: String,
}

#[derive(Debug, Deserialize)]
struct AuthorChannelId {
    value: String,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<ChannelItem> for ChannelRecord {
    fn from(item: ChannelItem) -> Self {
        Self {
            channel_id: item.id,
            title: item.snippet.title,
            description: item.snippet.description,
            published_at: item.snippet.published_at,
            view_count: count(&item.statistics.view_count),
            subscriber_count: count(&item.statistics.subscriber_count),
            video_count: count(&item.statistics.video_count),
        }
    }
}

impl From<VideoItem> for VideoRecord {
    fn from(item: VideoItem) -> Self {
        let thumbnail = item
            .snippet
            .thumbnails
            .and_then(|t| t.standard.or(t.default))
            .map(|t| t.url)
            .unwrap_or_default();
        let duration_secs =
            parse_iso8601_seconds(&item.content_details.duration).unwrap_or_default();

        Self {
            video_id: item.id,
            kind: item.kind,
            channel_id: item.snippet.channel_id,
            title: item.snippet.title,
            description: item.snippet.description,
            thumbnail,
            tags: item.snippet.tags.unwrap_or_default(),
            category_id: item.snippet.category_id.parse().unwrap_or(0),
            default_language: item.snippet.default_language,
            published_at: item.snippet.published_at,
            duration_secs,
            definition: item.content_details.definition,
            view_count: count(&item.statistics.view_count),
            like_count: count(&item.statistics.like_count),
            dislike_count: count(&item.statistics.dislike_count),
            favorite_count: count(&item.statistics.favorite_count),
            comment_count: count(&item.statistics.comment_count),
        }
    }
}

impl ThreadItem {
    /// Flatten the thread into its top-level comment. `None` when the
    /// author's account is gone and the platform omits the author id.
    fn into_record(self) -> Option<CommentRecord> {
        let video_id = self.snippet.video_id;
        let reply_count = self.snippet.total_reply_count;
        let top = self.snippet.top_level_comment;
        let author = top.snippet.author_channel_id?;
        Some(CommentRecord {
            comment_id: top.id,
            kind: if top.kind.is_empty() { self.kind } else { top.kind },
            author_id: author.value,
            author_name: top.snippet.author_display_name,
            like_count: top.snippet.like_count,
            parent_comment_id: None,
            published_at: top.snippet.published_at,
            updated_at: top.snippet.updated_at,
            text_display: top.snippet.text_display,
            text_original: top.snippet.text_original,
            video_id,
            reply_count,
        })
    }
}

impl CommentItem {
    fn into_reply_record(self) -> Option<CommentRecord> {
        let author = self.snippet.author_channel_id?;
        Some(CommentRecord {
            comment_id: self.id,
            kind: self.kind,
            author_id: author.value,
            author_name: self.snippet.author_display_name,
            like_count: self.snippet.like_count,
            parent_comment_id: self.snippet.parent_id,
            published_at: self.snippet.published_at,
            updated_at: self.snippet.updated_at,
            text_display: self.snippet.text_display,
            text_original: self.snippet.text_original,
            video_id: None,
            reply_count: 0,
        })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct YoutubeApiClient {
    http_client: Client,
    key_pool: KeyPool,
    retry: RetryExecutor,
}

impl YoutubeApiClient {
    pub fn new(api_keys: Vec<String>) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(CoreError::Network)?;

        Ok(Self {
            http_client,
            key_pool: KeyPool::new(api_keys),
            retry: RetryExecutor::new(RetryConfig::platform()),
        })
    }

    /// Fetch channel statistics for one channel.
    pub async fn channel_statistics(&self, channel_id: &str) -> Result<ChannelRecord, CoreError> {
        let params = vec![
            ("part".to_string(), "snippet,statistics".to_string()),
            ("id".to_string(), channel_id.to_string()),
        ];
        let page: PageEnvelope<ChannelItem> =
            self.get_json("channels", &params, channel_id).await?;
        let item = page.items.into_iter().next().ok_or_else(|| {
            CoreError::PlatformApi(PlatformApiError::ChannelNotFound {
                channel_id: channel_id.to_string(),
            })
        })?;
        debug!("Retrieved statistics for channel {}", channel_id);
        Ok(item.into())
    }

    /// One page of video discovery results.
    pub async fn search_page(
        &self,
        query: &SearchQuery,
        page_token: Option<&str>,
    ) -> Result<Page<SearchHit>, CoreError> {
        let mut params = vec![
            ("part".to_string(), "snippet,id".to_string()),
            ("maxResults".to_string(), PAGE_SIZE_SEARCH.to_string()),
            ("type".to_string(), "video".to_string()),
            ("safeSearch".to_string(), "none".to_string()),
        ];
        if let Some(channel_id) = &query.channel_id {
            params.push(("channelId".to_string(), channel_id.clone()));
        }
        if let Some(words) = &query.words {
            params.push(("q".to_string(), words.clone()));
        }
        if let Some(after) = &query.published_after {
            params.push(("publishedAfter".to_string(), after.to_rfc3339()));
        }
        if let Some(before) = &query.published_before {
            params.push(("publishedBefore".to_string(), before.to_rfc3339()));
        }
        if let Some(region) = &query.region_code {
            params.push(("regionCode".to_string(), region.clone()));
        }
        if let Some(lang) = &query.relevance_language {
            params.push(("relevanceLanguage".to_string(), lang.clone()));
        }
        if let Some(token) = page_token {
            params.push(("pageToken".to_string(), token.to_string()));
        }

        let page: PageEnvelope<SearchItem> = self.get_json("search", &params, "search").await?;
        let items = page
            .items
            .into_iter()
            .filter_map(|item| {
                let video_id = item.id.video_id?;
                Some(SearchHit {
                    video_id,
                    channel_id: item.snippet.channel_id,
                    title: item.snippet.title,
                    published_at: item.snippet.published_at,
                })
            })
            .collect();
        Ok(Page {
            items,
            next_page_token: page.next_page_token,
        })
    }

    /// Exhaust the discovery pagination up to `max_videos` results.
    pub async fn list_videos(
        &self,
        query: &SearchQuery,
        max_videos: usize,
    ) -> Result<Vec<SearchHit>, CoreError> {
        let mut hits = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page = self.search_page(query, token.as_deref()).await?;
            hits.extend(page.items);
            if hits.len() >= max_videos {
                hits.truncate(max_videos);
                break;
            }
            match page.next_page_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        info!("Discovered {} videos", hits.len());
        Ok(hits)
    }

    /// Full details for one video. `Ok(None)` when the platform has no
    /// record for the id (deleted or private video).
    pub async fn video_details(&self, video_id: &str) -> Result<Option<VideoRecord>, CoreError> {
        let params = vec![
            (
                "part".to_string(),
                "snippet,id,contentDetails,statistics".to_string(),
            ),
            ("id".to_string(), video_id.to_string()),
        ];
        let page: PageEnvelope<VideoItem> = self.get_json("videos", &params, video_id).await?;
        match page.items.into_iter().next() {
            Some(item) => Ok(Some(item.into())),
            None => {
                warn!("No platform record for video {}", video_id);
                Ok(None)
            }
        }
    }

    /// One page of top-level comment threads for a video.
    pub async fn comment_threads_page(
        &self,
        video_id: &str,
        page_token: Option<&str>,
    ) -> Result<Page<CommentRecord>, CoreError> {
        let mut params = vec![
            ("part".to_string(), "snippet,id".to_string()),
            ("maxResults".to_string(), PAGE_SIZE_COMMENTS.to_string()),
            ("textFormat".to_string(), "plainText".to_string()),
            ("videoId".to_string(), video_id.to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken".to_string(), token.to_string()));
        }

        let page: PageEnvelope<ThreadItem> =
            self.get_json("commentThreads", &params, video_id).await?;
        let items = page
            .items
            .into_iter()
            .filter_map(|item| item.into_record())
            .collect();
        Ok(Page {
            items,
            next_page_token: page.next_page_token,
        })
    }

    /// One page of replies under a top-level comment.
    pub async fn comment_replies_page(
        &self,
        parent_id: &str,
        page_token: Option<&str>,
    ) -> Result<Page<CommentRecord>, CoreError> {
        let mut params = vec![
            ("part".to_string(), "snippet,id".to_string()),
            ("maxResults".to_string(), PAGE_SIZE_COMMENTS.to_string()),
            ("textFormat".to_string(), "plainText".to_string()),
            ("parentId".to_string(), parent_id.to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken".to_string(), token.to_string()));
        }

        let page: PageEnvelope<CommentItem> =
            self.get_json("comments", &params, parent_id).await?;
        let items = page
            .items
            .into_iter()
            .filter_map(|item| item.into_reply_record())
            .collect();
        Ok(Page {
            items,
            next_page_token: page.next_page_token,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(String, String)],
        resource: &str,
    ) -> Result<T, CoreError> {
        self.retry
            .execute(endpoint, || self.fetch_once(endpoint, params, resource))
            .await
    }

    async fn fetch_once<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(String, String)],
        resource: &str,
    ) -> Result<T, CoreError> {
        let key = self.key_pool.pick().map_err(CoreError::PlatformApi)?.to_string();
        let url = format!("{}/{}", API_BASE, endpoint);

        debug!("Platform API request: {} ({})", endpoint, resource);
        let response = self
            .http_client
            .get(&url)
            .query(params)
            .query(&[("key", key.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CoreError::PlatformApi(PlatformApiError::RequestTimeout)
                } else {
                    CoreError::Network(e)
                }
            })?;

        let status = response.status();
        let body: serde_json::Value = response.json().await.map_err(|e| {
            CoreError::PlatformApi(PlatformApiError::InvalidResponse {
                details: format!("{} response was not JSON: {}", endpoint, e),
            })
        })?;

        // The platform signals failure through an `error` envelope in the
        // body even on some 200 responses; check it before the status code.
        if body.get("error").is_some() {
            let envelope: ApiErrorEnvelope = serde_json::from_value(body)
                .map_err(|e| {
                    CoreError::PlatformApi(PlatformApiError::InvalidResponse {
                        details: format!("unparseable error envelope: {}", e),
                    })
                })?;
            return Err(CoreError::PlatformApi(map_api_error(
                envelope.error,
                &key,
                resource,
            )));
        }

        if status.is_server_error() {
            return Err(CoreError::PlatformApi(PlatformApiError::ServerError {
                status_code: status.as_u16(),
            }));
        }

        serde_json::from_value(body).map_err(|e| {
            CoreError::PlatformApi(PlatformApiError::InvalidResponse {
                details: format!("failed to parse {} response: {}", endpoint, e),
            })
        })
    }
}

fn map_api_error(body: ApiErrorBody, key: &str, resource: &str) -> PlatformApiError {
    let reason = body
        .errors
        .first()
        .map(|d| d.reason.as_str())
        .unwrap_or_default();

    match reason {
        "quotaExceeded" | "dailyLimitExceeded" | "rateLimitExceeded" => {
            let suffix = key.chars().rev().take(4).collect::<String>();
            PlatformApiError::QuotaExhausted {
                key_suffix: suffix.chars().rev().collect(),
            }
        }
        "commentsDisabled" => PlatformApiError::CommentsDisabled {
            video_id: resource.to_string(),
        },
        "forbidden" => PlatformApiError::Forbidden {
            resource: resource.to_string(),
        },
        _ if body.code >= 500 => PlatformApiError::ServerError {
            status_code: body.code as u16,
        },
        _ => PlatformApiError::ErrorEnvelope {
            code: body.code,
            message: body.message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_thread_page_flattening() {
        let raw = json!({
            "items": [{
                "kind": "youtube#commentThread",
                "id": "thread1",
                "snippet": {
                    "videoId": "vid1",
                    "totalReplyCount": 2,
                    "topLevelComment": {
                        "kind": "youtube#comment",
                        "id": "thread1",
                        "snippet": {
                            "authorChannelId": {"value": "user1"},
                            "authorDisplayName": "Alice",
                            "likeCount": 3,
                            "publishedAt": "2018-07-01T10:00:00Z",
                            "updatedAt": "2018-07-01T10:00:00Z",
                            "textDisplay": "hello",
                            "textOriginal": "hello"
                        }
                    }
                }
            }],
            "nextPageToken": "tok"
        });

        let page: PageEnvelope<ThreadItem> = serde_json::from_value(raw).unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("tok"));
        let record = page.items.into_iter().next().unwrap().into_record().unwrap();
        assert_eq!(record.comment_id, "thread1");
        assert_eq!(record.author_id, "user1");
        assert_eq!(record.video_id.as_deref(), Some("vid1"));
        assert_eq!(record.reply_count, 2);
        assert!(record.parent_comment_id.is_none());
    }

    #[test]
    fn test_thread_without_author_is_dropped() {
        let raw = json!({
            "kind": "youtube#commentThread",
            "id": "t",
            "snippet": {
                "videoId": "v",
                "totalReplyCount": 0,
                "topLevelComment": {
                    "id": "t",
                    "snippet": {
                        "authorDisplayName": "ghost",
                        "likeCount": 0,
                        "publishedAt": "2018-07-01T10:00:00Z",
                        "updatedAt": "2018-07-01T10:00:00Z"
                    }
                }
            }
        });
        let item: ThreadItem = serde_json::from_value(raw).unwrap();
        assert!(item.into_record().is_none());
    }

    #[test]
    fn test_reply_record_carries_parent() {
        let raw = json!({
            "kind": "youtube#comment",
            "id": "reply1",
            "snippet": {
                "authorChannelId": {"value": "user2"},
                "authorDisplayName": "Bob",
                "likeCount": 1,
                "parentId": "thread1",
                "publishedAt": "2018-07-02T08:30:00Z",
                "updatedAt": "2018-07-02T08:30:00Z",
                "textDisplay": "reply",
                "textOriginal": "reply"
            }
        });
        let item: CommentItem = serde_json::from_value(raw).unwrap();
        let record = item.into_reply_record().unwrap();
        assert_eq!(record.parent_comment_id.as_deref(), Some("thread1"));
        assert!(record.video_id.is_none());
    }

    #[test]
    fn test_video_record_missing_stats_default_to_zero() {
        let raw = json!({
            "kind": "youtube#video",
            "id": "vid1",
            "snippet": {
                "channelId": "chan1",
                "title": "A video",
                "description": "text",
                "categoryId": "22",
                "publishedAt": "2018-06-01T00:00:00Z",
                "thumbnails": {"default": {"url": "http://img/1.jpg"}}
            },
            "contentDetails": {"duration": "PT4M13S", "definition": "hd"},
            "statistics": {"viewCount": "1000"}
        });
        let item: VideoItem = serde_json::from_value(raw).unwrap();
        let record: VideoRecord = item.into();
        assert_eq!(record.view_count, 1000);
        assert_eq!(record.like_count, 0);
        assert_eq!(record.dislike_count, 0);
        assert_eq!(record.duration_secs, 253);
        assert_eq!(record.category_id, 22);
        assert_eq!(record.thumbnail, "http://img/1.jpg");
        assert!(record.tags.is_empty());
    }

    #[test]
    fn test_error_envelope_quota_mapping() {
        let body = ApiErrorBody {
            code: 403,
            message: "quota".to_string(),
            errors: vec![ApiErrorDetail {
                reason: "quotaExceeded".to_string(),
            }],
        };
        let err = map_api_error(body, "AIzaSyTestKey1234", "videos");
        assert!(matches!(
            err,
            PlatformApiError::QuotaExhausted { ref key_suffix } if key_suffix == "1234"
        ));
    }

    #[test]
    fn test_error_envelope_comments_disabled() {
        let body = ApiErrorBody {
            code: 403,
            message: "disabled".to_string(),
            errors: vec![ApiErrorDetail {
                reason: "commentsDisabled".to_string(),
            }],
        };
        let err = map_api_error(body, "key", "vid9");
        assert!(matches!(
            err,
            PlatformApiError::CommentsDisabled { ref video_id } if video_id == "vid9"
        ));
    }

    #[test]
    fn test_search_page_skips_non_video_hits() {
        let raw = json!({
            "items": [
                {"id": {"videoId": "v1"}, "snippet": {"channelId": "c1", "title": "t", "publishedAt": "2018-01-01T00:00:00Z"}},
                {"id": {}, "snippet": {"channelId": "c2", "title": "channel hit", "publishedAt": "2018-01-01T00:00:00Z"}}
            ]
        });
        let page: PageEnvelope<SearchItem> = serde_json::from_value(raw).unwrap();
        let hits: Vec<SearchHit> = page
            .items
            .into_iter()
            .filter_map(|item| {
                let video_id = item.id.video_id?;
                Some(SearchHit {
                    video_id,
                    channel_id: item.snippet.channel_id,
                    title: item.snippet.title,
                    published_at: item.snippet.published_at,
                })
            })
            .collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].video_id, "v1");
    }
}
